//! Fixed-delay retry policy.

use std::time::Duration;

use crate::config::MAX_RETRIES;

/// Configuration for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Delay before every retry. No backoff growth.
    pub delay: Duration,
}

impl RetryConfig {
    /// Standard policy for batch submissions: the per-attempt timeout doubles
    /// as the pause between attempts.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay,
        }
    }
}

/// Stateless retry policy — computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th retry (1-based).
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.config.delay)
    }

    /// Returns `true` if retry number `attempt` is still within budget.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries + 1
    }
}
