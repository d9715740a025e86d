/// Time sources for the activity poller
use crate::utils::{current_time, lock};
use std::fmt::Debug;
use std::sync::Mutex;

/// Wall-clock time in fractional seconds since the Unix epoch.
pub trait Clock: Send + Sync + Debug {
    /// Current time.
    fn now(&self) -> f64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        current_time()
    }
}

/// A clock that only moves when told to.
///
/// Lets poll ticks be replayed deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Sets the current reading.
    pub fn set(&self, now: f64) {
        *lock(&self.now) = now;
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: f64) {
        *lock(&self.now) += seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *lock(&self.now)
    }
}
