//! Periodic output signal.
//!
//! Free running timer that fires once per period. It stays unarmed until
//! [`PeriodicSignal::restart`] anchors the phase, which the quantizer does on
//! the first push.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do when more than one period elapsed between two checks.
///
/// Either way a single `consume_fire` call reports at most one fire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUp {
    /// Advance the boundary past every elapsed period. Phase is kept, lost
    /// periods are not owed.
    #[default]
    Skip,
    /// Advance the boundary one period per fire. A late caller keeps firing on
    /// every call until it is back in phase.
    Burst,
}

#[derive(Clone, Debug)]
pub struct PeriodicSignal {
    period: Duration,
    catch_up: CatchUp,
    /// Boundary of the last fire, `None` while unarmed.
    last_boundary: Option<Instant>,
}

impl PeriodicSignal {
    /// `period` must be non-zero; `QuantizerConfig::validate` guarantees it.
    pub fn new(period: Duration, catch_up: CatchUp) -> Self {
        Self {
            period,
            catch_up,
            last_boundary: None,
        }
    }

    /// Signal firing `rate_hz` times per second.
    pub fn from_rate_hz(rate_hz: f64, catch_up: CatchUp) -> Result<Self, ConfigError> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(ConfigError::InvalidRate(rate_hz));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate_hz)
            .map_err(|_| ConfigError::InvalidRate(rate_hz))?;
        if period.is_zero() {
            return Err(ConfigError::InvalidRate(rate_hz));
        }
        Ok(Self::new(period, catch_up))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.last_boundary.is_some()
    }

    /// Re-anchor the phase: the next fire is exactly one period after `now`.
    pub fn restart(&mut self, now: Instant) {
        self.last_boundary = Some(now);
    }

    fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.last_boundary
            .map(|last| now.saturating_duration_since(last))
    }

    /// Non-consuming check that a full period has elapsed.
    pub fn enough_time_has_passed(&self, now: Instant) -> bool {
        self.elapsed(now).is_some_and(|e| e >= self.period)
    }

    /// Report a fire if a full period elapsed and move the boundary forward.
    pub fn consume_fire(&mut self, now: Instant) -> bool {
        let (Some(last), Some(elapsed)) = (self.last_boundary, self.elapsed(now)) else {
            return false;
        };
        if elapsed < self.period {
            return false;
        }

        let advance = match self.catch_up {
            CatchUp::Burst => self.period,
            CatchUp::Skip => whole_periods(elapsed, self.period),
        };
        self.last_boundary = Some(last + advance);

        true
    }

    /// How far into the current period `now` is, in `[0, 1]`.
    ///
    /// Meant for interpolation on the consumer side. `0.0` while unarmed;
    /// saturates at `1.0` while a fire is pending.
    pub fn fraction_of_current_period(&self, now: Instant) -> f64 {
        match self.elapsed(now) {
            None => 0.0,
            Some(e) => (e.as_secs_f64() / self.period.as_secs_f64()).min(1.0),
        }
    }
}

fn whole_periods(elapsed: Duration, period: Duration) -> Duration {
    let n = elapsed.as_nanos() / period.as_nanos();
    let nanos = n.saturating_mul(period.as_nanos());
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn signal(catch_up: CatchUp) -> (PeriodicSignal, Instant) {
        let mut s = PeriodicSignal::new(ms(10), catch_up);
        let t0 = Instant::now();
        s.restart(t0);
        (s, t0)
    }

    #[test]
    fn unarmed_never_fires() {
        let mut s = PeriodicSignal::new(ms(10), CatchUp::Skip);
        let later = Instant::now() + ms(1_000);

        assert!(!s.is_armed());
        assert!(!s.enough_time_has_passed(later));
        assert!(!s.consume_fire(later));
        assert_eq!(s.fraction_of_current_period(later), 0.0);
    }

    #[test]
    fn fires_once_per_period() {
        let (mut s, t0) = signal(CatchUp::Skip);

        assert!(!s.consume_fire(t0 + ms(9)));
        assert!(s.enough_time_has_passed(t0 + ms(10)));
        assert!(s.consume_fire(t0 + ms(10)));
        assert!(!s.consume_fire(t0 + ms(10)));
        assert!(!s.consume_fire(t0 + ms(19)));
        assert!(s.consume_fire(t0 + ms(20)));
    }

    #[test]
    fn skip_drops_missed_periods_but_keeps_phase() {
        let (mut s, t0) = signal(CatchUp::Skip);

        // 3.5 periods late: one fire, boundary at 30ms
        assert!(s.consume_fire(t0 + ms(35)));
        assert!(!s.consume_fire(t0 + ms(36)));
        assert!(!s.consume_fire(t0 + ms(39)));
        assert!(s.consume_fire(t0 + ms(40)));
    }

    #[test]
    fn burst_owes_missed_periods_one_per_call() {
        let (mut s, t0) = signal(CatchUp::Burst);
        let late = t0 + ms(35);

        assert!(s.consume_fire(late));
        assert!(s.consume_fire(late));
        assert!(s.consume_fire(late));
        assert!(!s.consume_fire(late));
        assert!(s.consume_fire(t0 + ms(40)));
    }

    #[test]
    fn fraction_tracks_phase_and_saturates() {
        let (mut s, t0) = signal(CatchUp::Skip);

        assert_eq!(s.fraction_of_current_period(t0), 0.0);
        assert!((s.fraction_of_current_period(t0 + ms(5)) - 0.5).abs() < 1e-9);
        assert_eq!(s.fraction_of_current_period(t0 + ms(25)), 1.0);

        s.consume_fire(t0 + ms(25));
        assert!((s.fraction_of_current_period(t0 + ms(25)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn restart_realigns_phase() {
        let (mut s, t0) = signal(CatchUp::Skip);

        s.restart(t0 + ms(7));
        assert!(!s.consume_fire(t0 + ms(10)));
        assert!(s.consume_fire(t0 + ms(17)));
    }

    #[test]
    fn time_going_backwards_is_not_a_fire() {
        let (mut s, t0) = signal(CatchUp::Skip);
        s.restart(t0 + ms(50));

        assert!(!s.consume_fire(t0));
        assert_eq!(s.fraction_of_current_period(t0), 0.0);
    }

    #[test]
    fn from_rate_hz_defaults_to_sixty() {
        let s = PeriodicSignal::from_rate_hz(60.0, CatchUp::Skip).unwrap();
        let p = s.period().as_secs_f64();
        assert!((p - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn from_rate_hz_rejects_unusable_rates() {
        for rate in [0.0, -60.0, f64::NAN, f64::INFINITY, 1e30] {
            assert!(
                matches!(
                    PeriodicSignal::from_rate_hz(rate, CatchUp::Skip),
                    Err(ConfigError::InvalidRate(_))
                ),
                "rate {rate} accepted"
            );
        }
    }
}
