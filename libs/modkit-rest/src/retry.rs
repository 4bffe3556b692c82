use crate::config::RetryConfig;
use std::time::Duration;

/// Per-call retry state.
///
/// Mutated in place on every retry: the attempt counter grows by one and the
/// timeout grows by `timeout * backoff_multiplier`. With `max_retries = N`
/// the call performs at most `N + 1` attempts. Network timeouts and
/// successful re-authentications draw from the same budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    current_timeout: Duration,
    current_retry_count: u32,
    max_retries: u32,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Negative or non-finite multipliers are treated as `0.0`.
    #[must_use]
    pub fn new(timeout: Duration, max_retries: u32, backoff_multiplier: f64) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_finite() && backoff_multiplier > 0.0 {
            backoff_multiplier
        } else {
            0.0
        };
        Self {
            current_timeout: timeout,
            current_retry_count: 0,
            max_retries,
            backoff_multiplier,
        }
    }

    /// Timeout to use for the next attempt
    #[must_use]
    pub fn current_timeout(&self) -> Duration {
        self.current_timeout
    }

    /// Retries consumed so far
    #[must_use]
    pub fn current_retry_count(&self) -> u32 {
        self.current_retry_count
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Number of the attempt about to be made, starting at 1.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.current_retry_count.saturating_add(1)
    }

    #[must_use]
    pub fn has_attempt_remaining(&self) -> bool {
        self.current_retry_count <= self.max_retries
    }

    /// Consume one retry and grow the timeout.
    ///
    /// Returns `false` once the budget is exhausted; the caller must then
    /// surface a terminal error.
    #[must_use = "an exhausted policy must end the call"]
    pub fn retry(&mut self) -> bool {
        self.current_retry_count = self.current_retry_count.saturating_add(1);
        let growth = Duration::try_from_secs_f64(
            self.current_timeout.as_secs_f64() * self.backoff_multiplier,
        )
        .unwrap_or(Duration::MAX);
        self.current_timeout = self.current_timeout.saturating_add(growth);
        self.has_attempt_remaining()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(
            config.timeout,
            config.max_retries,
            config.backoff_multiplier,
        )
    }
}

/// Caller-supplied retry settings.
///
/// Only fields that were explicitly set replace the descriptor defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryOverrides {
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub backoff_multiplier: Option<f64>,
}

impl RetryOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timeout.is_none() && self.max_retries.is_none() && self.backoff_multiplier.is_none()
    }

    /// Layer these overrides over `base`.
    #[must_use]
    pub fn apply(&self, base: RetryConfig) -> RetryConfig {
        RetryConfig {
            timeout: self.timeout.unwrap_or(base.timeout),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(base.backoff_multiplier),
        }
    }
}
