//! Caller-level retry policy.
//!
//! The coordinator never retries a step on its own. A policy layered on top
//! may repeat an update whose error [`is_retryable`], i.e. a `Step1Failed`
//! with a transient cause, which left no trace and behaves like a first
//! attempt when repeated. Partial outcomes are never retried.
//!
//! [`is_retryable`]: crate::UpdateError::is_retryable

use std::time::Duration;

use crate::error::UpdateError;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_backoff: Duration,

    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }

    /// A policy making up to `retries` additional attempts.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Self::none()
        }
    }

    /// Sets the backoff bounds.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Returns true if another attempt should follow `attempt` (1-based)
    /// that failed with `error`.
    pub fn should_retry(&self, error: &UpdateError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}
