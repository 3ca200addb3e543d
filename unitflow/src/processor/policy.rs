//! Retry policy for unit processing.

use std::time::Duration;

/// Default number of provider attempts per unit.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff step; the delay after attempt `n` is `n * step`.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// How many times to try a unit and how long to wait between attempts.
///
/// Backoff is linear: after attempt `n` fails the processor waits
/// `n * backoff_step` before attempt `n + 1`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use unitflow::processor::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .with_max_attempts(4)
///     .with_backoff_step(Duration::from_millis(500));
///
/// assert_eq!(policy.max_attempts(), 4);
/// assert_eq!(policy.delay_after(2), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts (at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the linear backoff step.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_step(&self) -> Duration {
        self.backoff_step
    }

    /// Delay to wait after the given (1-based) attempt failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}
