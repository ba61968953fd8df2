//! Retry timing for the broker connect loop.

use std::time::Duration;

/// Default pause between connect attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Fixed-interval retry policy
///
/// The connect loop never gives up on its own, so there is no attempt cap;
/// the delay does not grow and carries no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause after each failed attempt
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given fixed interval
    #[must_use]
    pub const fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    #[must_use]
    pub fn backoff_duration(&self, _attempt: u32) -> Duration {
        self.interval
    }
}
