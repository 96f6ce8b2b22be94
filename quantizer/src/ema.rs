pub const DEFAULT_ALPHA: f64 = 0.1;

/// Exponential moving average.
///
/// `value = alpha * sample + (1 - alpha) * value`. The first sample seeds the
/// average directly so a fresh tracker does not start biased towards zero.
#[derive(Clone, Debug)]
pub struct ExponentialMovingAverage {
    alpha: f64,
    value: Option<f64>,
    samples: u64,
}

impl ExponentialMovingAverage {
    /// `alpha` is expected in `(0, 1]`; `QuantizerConfig::validate` enforces it.
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            value: None,
            samples: 0,
        }
    }

    pub fn add_sample(&mut self, sample: f64) {
        self.value = Some(match self.value {
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        });
        self.samples += 1;
    }

    /// Current average, `0.0` before the first sample.
    pub fn get(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for ExponentialMovingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_before_any_sample() {
        let ema = ExponentialMovingAverage::default();
        assert_eq!(ema.get(), 0.0);
        assert_eq!(ema.samples(), 0);
    }

    #[test]
    fn first_sample_seeds_value() {
        let mut ema = ExponentialMovingAverage::new(0.1);
        ema.add_sample(4.0);
        assert_eq!(ema.get(), 4.0);
    }

    #[test]
    fn converges_towards_constant_sample() {
        let mut ema = ExponentialMovingAverage::new(0.1);
        ema.add_sample(0.0);

        for _ in 0..100 {
            ema.add_sample(3.0);
        }

        // remaining error is 3 * 0.9^100
        assert!((ema.get() - 3.0).abs() < 1e-3);
        assert_eq!(ema.samples(), 101);
    }

    #[test]
    fn alpha_one_tracks_last_sample() {
        let mut ema = ExponentialMovingAverage::new(1.0);
        ema.add_sample(1.0);
        ema.add_sample(7.0);
        assert_eq!(ema.get(), 7.0);
    }
}
