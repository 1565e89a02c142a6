// src/decoder/pacing.rs
//
// Emission pacing. After each published reading the decoder waits one
// interval before accepting the next frame, bounding the publish rate.

use std::time::Duration;

/// Default delay (ms) after each published reading.
pub const DEFAULT_PACE_MS: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// A pacer that never waits. Used by tests and replay tooling.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block the calling thread for one interval. No-op when disabled.
    pub fn pause(&self) {
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::from_millis(DEFAULT_PACE_MS)
    }
}
