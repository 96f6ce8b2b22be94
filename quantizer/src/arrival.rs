//! Arrival timing monitor.
//!
//! Records when states arrive from the producer and keeps statistics on the
//! inter-arrival interval. Purely observational: nothing in the playout path
//! reads these numbers. [`ArrivalMonitor::estimated_period`] is the value a
//! rate-matching policy would feed back into the output period.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::rolling_window::RollingWindow;

/// Snapshot of inter-arrival statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ArrivalStats {
    /// Number of intervals observed (one less than the number of marks).
    pub samples: u64,
    #[serde(rename = "mean_us", serialize_with = "as_micros")]
    pub mean: Duration,
    #[serde(rename = "std_dev_us", serialize_with = "as_micros")]
    pub std_dev: Duration,
    /// Variance in microseconds squared.
    pub variance_us2: f64,
    #[serde(rename = "min_us", serialize_with = "as_micros")]
    pub min: Duration,
    #[serde(rename = "max_us", serialize_with = "as_micros")]
    pub max: Duration,
    #[serde(rename = "recent_mean_us", serialize_with = "as_micros")]
    pub recent_mean: Duration,
    /// Longest gap seen inside the recent window.
    #[serde(rename = "recent_max_us", serialize_with = "as_micros")]
    pub recent_max: Duration,
    pub estimated_rate_hz: Option<f64>,
}

fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1e6)
}

#[derive(Debug)]
pub struct ArrivalMonitor {
    last_mark: Option<Instant>,
    count: u64,
    // Welford running mean / M2, in microseconds
    mean_us: f64,
    m2_us: f64,
    min: Option<Duration>,
    max: Option<Duration>,
    recent: RollingWindow,
}

impl ArrivalMonitor {
    pub fn new(recent_window: Duration) -> Self {
        Self {
            last_mark: None,
            count: 0,
            mean_us: 0.0,
            m2_us: 0.0,
            min: None,
            max: None,
            recent: RollingWindow::new(recent_window),
        }
    }

    /// Record an arrival at `now` and return the interval since the last one.
    pub fn mark(&mut self, now: Instant) -> Option<Duration> {
        let previous = self.last_mark.replace(now)?;
        let interval = now.saturating_duration_since(previous);
        let us = interval.as_secs_f64() * 1e6;

        self.count += 1;
        let delta = us - self.mean_us;
        self.mean_us += delta / self.count as f64;
        self.m2_us += delta * (us - self.mean_us);

        self.min = Some(self.min.map_or(interval, |m| m.min(interval)));
        self.max = Some(self.max.map_or(interval, |m| m.max(interval)));

        self.recent.push(now, us);

        Some(interval)
    }

    pub fn samples(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<Duration> {
        (self.count > 0).then(|| micros(self.mean_us))
    }

    /// Population variance of the interval, in microseconds squared.
    pub fn variance_us2(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2_us / self.count as f64
        }
    }

    /// Mean producer period observed so far.
    pub fn estimated_period(&self) -> Option<Duration> {
        self.mean().filter(|p| !p.is_zero())
    }

    pub fn stats(&self) -> ArrivalStats {
        let variance_us2 = self.variance_us2();

        ArrivalStats {
            samples: self.count,
            mean: self.mean().unwrap_or_default(),
            std_dev: micros(variance_us2.sqrt()),
            variance_us2,
            min: self.min.unwrap_or_default(),
            max: self.max.unwrap_or_default(),
            recent_mean: self.recent.mean().map(micros).unwrap_or_default(),
            recent_max: self.recent.max().map(micros).unwrap_or_default(),
            estimated_rate_hz: self.estimated_period().map(|p| 1.0 / p.as_secs_f64()),
        }
    }
}

impl Default for ArrivalMonitor {
    fn default() -> Self {
        Self::new(crate::rolling_window::DEFAULT_MAX_AGE)
    }
}

fn micros(us: f64) -> Duration {
    Duration::from_secs_f64(us.max(0.0) / 1e6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn close(a: Duration, b: Duration) -> bool {
        a.abs_diff(b) < Duration::from_micros(1)
    }

    #[test]
    fn first_mark_has_no_interval() {
        let mut m = ArrivalMonitor::default();

        assert_eq!(m.mark(Instant::now()), None);
        assert_eq!(m.samples(), 0);
        assert_eq!(m.mean(), None);
        assert_eq!(m.estimated_period(), None);
        assert_eq!(m.stats().estimated_rate_hz, None);
    }

    #[test]
    fn mean_and_variance_of_known_intervals() {
        let base = Instant::now();
        let mut m = ArrivalMonitor::new(ms(1_000));

        // intervals: 10ms, 20ms, 30ms
        m.mark(base);
        assert_eq!(m.mark(base + ms(10)), Some(ms(10)));
        m.mark(base + ms(30));
        m.mark(base + ms(60));

        let stats = m.stats();
        assert_eq!(stats.samples, 3);
        assert!(close(stats.mean, ms(20)));
        assert!(close(stats.min, ms(10)));
        assert!(close(stats.max, ms(30)));

        // population variance of {10000, 20000, 30000} us
        let expected = 200_000_000.0 / 3.0;
        assert!((stats.variance_us2 - expected).abs() < 1e-3);
        assert!((stats.estimated_rate_hz.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn recent_window_forgets_old_gaps() {
        let base = Instant::now();
        let mut m = ArrivalMonitor::new(ms(100));

        m.mark(base);
        m.mark(base + ms(80)); // long gap
        for i in 1..=20 {
            m.mark(base + ms(80 + i * 10));
        }

        let stats = m.stats();
        assert!(close(stats.max, ms(80)));
        assert!(close(stats.recent_max, ms(10)));
        assert!(close(stats.recent_mean, ms(10)));
    }

    #[test]
    fn stats_serialize_in_microseconds() {
        let base = Instant::now();
        let mut m = ArrivalMonitor::default();
        m.mark(base);
        m.mark(base + ms(2));

        let json = serde_json::to_value(m.stats()).unwrap();
        assert!((json["mean_us"].as_f64().unwrap() - 2_000.0).abs() < 1e-6);
        assert_eq!(json["samples"], 1);
    }
}
