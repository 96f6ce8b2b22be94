use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::{DEFAULT_INITIAL_CAPACITY, OverflowPolicy};
use crate::ema::DEFAULT_ALPHA;
use crate::error::ConfigError;
use crate::periodic::CatchUp;

pub const DEFAULT_OUTPUT_RATE_HZ: f64 = 60.0;
pub const DEFAULT_REFILL_THRESHOLD: usize = 2;
pub const DEFAULT_ARRIVAL_WINDOW_MS: u64 = 1_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizerConfig {
    /// Output cadence, in fires per second.
    ///
    /// The consumer should call `update()` at least this often; calling at
    /// exactly this rate is the intended use.
    pub output_rate_hz: f64,

    /// Smoothing factor of the buffer occupancy moving average.
    /// Larger values react faster to occupancy changes.
    pub ema_alpha: f64,

    /// Pre-allocated buffer slots. Only a hint; see `overflow` for the limit.
    pub initial_capacity: usize,

    /// After the buffer ran dry, emission resumes only once this many states
    /// are buffered.
    ///
    /// With the default of 2, the first state after an outage is held back for
    /// one period so a single late arrival does not immediately empty the
    /// buffer again.
    pub refill_threshold: usize,

    /// Behaviour when the producer outruns the consumer.
    pub overflow: OverflowPolicy,

    /// Behaviour when `update()` is called late.
    pub catch_up: CatchUp,

    /// Length of the recent window used for arrival statistics.
    pub arrival_window_ms: u64,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            output_rate_hz: DEFAULT_OUTPUT_RATE_HZ,
            ema_alpha: DEFAULT_ALPHA,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            refill_threshold: DEFAULT_REFILL_THRESHOLD,
            overflow: OverflowPolicy::default(),
            catch_up: CatchUp::default(),
            arrival_window_ms: DEFAULT_ARRIVAL_WINDOW_MS,
        }
    }
}

impl QuantizerConfig {
    /// Defaults overridden by `QUANTIZER_*` environment variables.
    ///
    /// `QUANTIZER_MAX_BUFFERED=0` selects an unbounded buffer; any other value
    /// keeps drop-oldest with that limit.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(rate) = env_parse("QUANTIZER_OUTPUT_RATE_HZ")? {
            cfg.output_rate_hz = rate;
        }
        if let Some(alpha) = env_parse("QUANTIZER_EMA_ALPHA")? {
            cfg.ema_alpha = alpha;
        }
        if let Some(capacity) = env_parse("QUANTIZER_INITIAL_CAPACITY")? {
            cfg.initial_capacity = capacity;
        }
        if let Some(threshold) = env_parse("QUANTIZER_REFILL_THRESHOLD")? {
            cfg.refill_threshold = threshold;
        }
        if let Some(max_len) = env_parse::<usize>("QUANTIZER_MAX_BUFFERED")? {
            cfg.overflow = match max_len {
                0 => OverflowPolicy::Unbounded,
                max_len => OverflowPolicy::DropOldest { max_len },
            };
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.output_rate_hz.is_finite() || self.output_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidRate(self.output_rate_hz));
        }
        // a rate so high the period rounds to zero nanoseconds
        if self.period().is_zero() {
            return Err(ConfigError::InvalidRate(self.output_rate_hz));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(self.ema_alpha));
        }
        if self.refill_threshold == 0 {
            return Err(ConfigError::InvalidRefillThreshold);
        }
        if let Some(max_len) = self.overflow.max_len() {
            if max_len < self.refill_threshold {
                return Err(ConfigError::CapacityBelowRefill {
                    max_len,
                    refill_threshold: self.refill_threshold,
                });
            }
        }
        Ok(())
    }

    /// Output period. Only meaningful for a validated config.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.output_rate_hz).unwrap_or(Duration::ZERO)
    }

    pub fn arrival_window(&self) -> Duration {
        Duration::from_millis(self.arrival_window_ms)
    }
}

fn env_parse<V: FromStr>(key: &'static str) -> Result<Option<V>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = QuantizerConfig::default();

        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.refill_threshold, 2);
        assert!((cfg.period().as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_rates() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e30] {
            let cfg = QuantizerConfig {
                output_rate_hz: rate,
                ..Default::default()
            };
            assert!(
                matches!(cfg.validate(), Err(ConfigError::InvalidRate(_))),
                "rate {rate} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_bad_alpha() {
        for alpha in [0.0, -0.5, 1.5, f64::NAN] {
            let cfg = QuantizerConfig {
                ema_alpha: alpha,
                ..Default::default()
            };
            assert!(matches!(cfg.validate(), Err(ConfigError::InvalidAlpha(_))));
        }
    }

    #[test]
    fn rejects_zero_refill_threshold() {
        let cfg = QuantizerConfig {
            refill_threshold: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidRefillThreshold));
    }

    #[test]
    fn rejects_limit_below_refill_threshold() {
        let cfg = QuantizerConfig {
            overflow: OverflowPolicy::DropNewest { max_len: 1 },
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::CapacityBelowRefill {
                max_len: 1,
                refill_threshold: 2
            })
        );
    }

    #[test]
    fn unbounded_has_no_limit_to_check() {
        let cfg = QuantizerConfig {
            overflow: OverflowPolicy::Unbounded,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: QuantizerConfig =
            serde_json::from_str(r#"{"output_rate_hz":30.0,"catch_up":"burst"}"#).unwrap();

        assert_eq!(cfg.output_rate_hz, 30.0);
        assert_eq!(cfg.catch_up, CatchUp::Burst);
        assert_eq!(cfg.refill_threshold, DEFAULT_REFILL_THRESHOLD);
        assert_eq!(cfg.overflow, OverflowPolicy::default());
    }

    #[test]
    fn env_parse_reads_and_rejects_values() {
        assert_eq!(env_parse::<f64>("QUANTIZER_TEST_NEVER_SET"), Ok(None));

        // SAFETY: these keys are only touched by this test
        unsafe {
            std::env::set_var("QUANTIZER_TEST_RATE_OK", " 30 ");
            std::env::set_var("QUANTIZER_TEST_RATE_BAD", "fast");
        }

        assert_eq!(env_parse::<f64>("QUANTIZER_TEST_RATE_OK"), Ok(Some(30.0)));
        assert_eq!(
            env_parse::<f64>("QUANTIZER_TEST_RATE_BAD"),
            Err(ConfigError::InvalidEnv {
                key: "QUANTIZER_TEST_RATE_BAD",
                value: "fast".into()
            })
        );
    }
}
