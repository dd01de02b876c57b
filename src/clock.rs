//! Monotonic time source for the control loop

use std::time::{Duration, Instant};

/// Time source used for observation timestamps, pauses and indicator pulses.
pub trait Clock {
    /// Monotonic time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Block the loop for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock implementation backed by `Instant` and `thread::sleep`
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
