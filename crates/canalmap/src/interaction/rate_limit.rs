use std::time::{Duration, Instant};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(16);

/// Lets an action through at most once per `min_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    min_interval: Duration,
    last_fire: Option<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_fire: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn ready(&self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    /// Records a firing and returns true when the interval has elapsed.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if !self.ready(now) {
            return false;
        }
        self.last_fire = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}
