//! Retry delay policy
//!
//! Computes the sleep between fetch attempts: `base^attempt`, saturating at a
//! configurable cap so a long outage cannot grow the sleep without bound.

use std::time::Duration;

/// Exponential backoff policy.
///
/// `delay(attempt)` is `base^attempt` (so the first retry after a 2 s base
/// sleeps 1 s, then 2 s, 4 s, 8 s, ...), clamped to `cap`. Pure computation,
/// no clock access.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    /// Create a policy with the given base and cap
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay before the retry following failed attempt `attempt` (0-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        let secs = self.base.as_secs_f64().powi(attempt as i32);
        if !secs.is_finite() || secs >= self.cap.as_secs_f64() {
            return self.cap;
        }
        Duration::from_secs_f64(secs)
    }
}
