use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_millis(1_000);

/// A timestamped value used inside the rolling window
#[derive(Clone, Debug)]
struct TimedValue {
    seq: u64,
    at: Instant,
    value: f64,
}

/// Time-bounded window of samples with O(1) `max()` and `mean()`.
#[derive(Debug)]
pub struct RollingWindow {
    /// All values in the window (ordered by time)
    values: VecDeque<TimedValue>,

    /// Monotonic deque storing decreasing values for fast max lookup.
    /// The front always holds the maximum element in the current window.
    max_queue: VecDeque<TimedValue>,

    sum: f64,
    next_seq: u64,
    max_age: Duration,
}

impl RollingWindow {
    pub fn new(max_age: Duration) -> Self {
        Self {
            values: VecDeque::new(),
            max_queue: VecDeque::new(),
            sum: 0.0,
            next_seq: 0,
            max_age,
        }
    }

    pub fn push(&mut self, at: Instant, value: f64) {
        let val = TimedValue {
            seq: self.next_seq,
            at,
            value,
        };
        self.next_seq += 1;

        self.values.push_back(val.clone());
        self.sum += value;

        // Maintain monotonic decreasing max_queue
        while let Some(back) = self.max_queue.back() {
            if back.value < value {
                self.max_queue.pop_back();
            } else {
                break;
            }
        }
        self.max_queue.push_back(val);

        self.evict_old(at);
    }

    /// Evict values older than max_age
    fn evict_old(&mut self, now: Instant) {
        while let Some(front) = self.values.front() {
            if now.saturating_duration_since(front.at) <= self.max_age {
                break;
            }

            let Some(removed) = self.values.pop_front() else {
                break;
            };
            self.sum -= removed.value;

            if self
                .max_queue
                .front()
                .is_some_and(|max_front| max_front.seq == removed.seq)
            {
                self.max_queue.pop_front();
            }
        }

        if self.values.is_empty() {
            // drop accumulated float error
            self.sum = 0.0;
        }
    }

    pub fn max(&self) -> Option<f64> {
        self.max_queue.front().map(|v| v.value)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }

    #[cfg(test)]
    fn latest(&self) -> Option<f64> {
        self.values.back().map(|v| v.value)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.values.len()
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}
