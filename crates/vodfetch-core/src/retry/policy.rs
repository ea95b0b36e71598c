use std::time::Duration;

use super::ErrorClass;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempts are exhausted.
    GiveUp,
    /// Sleep `after`, optionally log in again, then retry.
    Retry { after: Duration, reauthenticate: bool },
}

/// Linear backoff keyed to error class.
///
/// The wait before retry `n` (0-based attempt that just failed) is
/// `(n + 1) * busy_step` when the device reported busy and
/// `(n + 1) * retry_step` otherwise. Broken sessions additionally ask for a
/// fresh login.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub busy_step: Duration,
    pub retry_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            busy_step: Duration::from_secs(5),
            retry_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after `attempt` (0-based) failed with `class`.
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> RetryDecision {
        if attempt.saturating_add(1) >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let step = match class {
            ErrorClass::Busy => self.busy_step,
            ErrorClass::SessionBroken | ErrorClass::Other => self.retry_step,
        };
        RetryDecision::Retry {
            after: step.saturating_mul(attempt + 1),
            reauthenticate: class == ErrorClass::SessionBroken,
        }
    }
}
