//! Wall-clock timer for run statistics.

use std::time::{Duration, Instant};

/// Measures time since it was created.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Average rate of `count` events over the timer's lifetime, in events per second.
    ///
    /// Returns 0.0 before any measurable time has passed.
    pub fn rate(&self, count: u64) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 { count as f64 / secs } else { 0.0 }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
