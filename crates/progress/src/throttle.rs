use std::time::{Duration, Instant};

/// Rate limit for terminal redraws.
///
/// Callers ask for permission to redraw; a request arriving before
/// `interval` has passed since the last granted one is refused outright
/// rather than delayed. Only rendering is gated, never the transfer itself.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_emit: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` (and records `now`) if a redraw may happen at `now`.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_emit = Some(now);
                true
            },
        }
    }
}
