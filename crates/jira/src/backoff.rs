use std::time::Duration;

/// Exponential backoff schedule for retrying transient upstream failures.
///
/// `delay(attempt)` doubles from `min_delay` and returns `None` once the
/// retry budget is spent: either `max_attempts` is reached or the next
/// step would exceed `max_delay`. A `None` from the policy means the
/// failure is terminal and the last cause should be surfaced.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(min_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before retry number `attempt` (0-based), or `None` when exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt)?;
        let delay = self.min_delay.saturating_mul(factor);
        if delay > self.max_delay {
            return None;
        }
        Some(delay)
    }
}
