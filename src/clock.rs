//! Monotonic time, injectable so freshness deadlines (§3, §8 scenario 2)
//! can be driven deterministically in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_secs(&self) -> f64;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// A clock a test can advance deterministically.
pub struct FakeClock {
    secs: Mutex<f64>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeClock { secs: Mutex::new(0.0) })
    }

    pub fn advance(&self, by_secs: f64) {
        *self.secs.lock() += by_secs;
    }
}

impl Clock for FakeClock {
    fn now_secs(&self) -> f64 {
        *self.secs.lock()
    }
}
