//! Linear backoff retry policy for eventual-consistency lookups.

use std::time::Duration;

/// Configuration for the lookup retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay; the wait before attempt N+1 is `N * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Stateless linear retry policy — computes the next delay given the
/// attempt number. The schedule grows linearly rather than exponentially:
/// the lookups it paces are absorbing short server-side propagation lag,
/// not recovering from outages.
#[derive(Debug, Clone)]
pub struct LinearRetry {
    pub config: RetryConfig,
}

impl LinearRetry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay to wait after the `attempt`-th failure (1-based).
    /// Returns `None` once `attempt` reaches `max_attempts`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.config.max_attempts {
            return None;
        }
        Some(self.config.base_delay * attempt)
    }
}
