//! Time sources.
//!
//! Everything in this crate reads time through [`Clock`] so simulations and
//! tests can drive a [`ManualClock`] instead of the wall clock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// `std::time::Instant` backed clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
///
/// Clones share the same offset, so a test can keep one handle and give the
/// other to a `Quantizer`.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Jump to an absolute offset from the origin. Moving backwards is ignored.
    pub fn set_elapsed(&self, elapsed: Duration) {
        let mut offset = self.offset.lock();
        if elapsed > *offset {
            *offset = elapsed;
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}
