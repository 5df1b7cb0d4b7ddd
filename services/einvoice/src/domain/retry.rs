use std::time::Duration;

use crate::domain::types::FailureClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry once `Duration` has passed since the last failure.
    RetryAfter(Duration),
    GiveUp,
}

/// Exponential backoff for automatic resubmission.
///
/// Only the reconciliation pass consults this; the user-triggered retry
/// endpoint is never throttled by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30 * 60),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// `attempt` counts automatic retries already made (0 before the first).
    pub fn decide(&self, attempt: u32, max_attempts: u32, class: FailureClass) -> RetryDecision {
        if class == FailureClass::Permanent || attempt >= max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for_attempt(attempt))
    }

    /// `base × 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_delay)
    }
}
