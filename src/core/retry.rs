//! Retry policy: error-driven retry decisions and exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::breaker::{BreakerState, CircuitBreaker};
use crate::core::error::ErrorClass;
use crate::core::job::Task;

/// Tuning knobs for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Exponential growth factor per retry.
    pub multiplier: f64,
    /// Ceiling on any computed delay.
    pub max_delay_ms: u64,
    /// Retry budget assigned to tasks at graph construction.
    pub default_max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            default_max_retries: 3,
        }
    }
}

/// Decides whether and when a failed task runs again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Retry budget to assign to new tasks.
    #[must_use]
    pub const fn default_max_retries(&self) -> u32 {
        self.config.default_max_retries
    }

    /// Whether `task` should be retried after a failure of `class`.
    ///
    /// True iff budget remains, the class is retryable, and the relevant
    /// breaker is not open. Severity never factors in here.
    #[must_use]
    pub fn should_retry(&self, task: &Task, class: ErrorClass, breaker: &CircuitBreaker) -> bool {
        task.current_retry_count < task.max_retry_count
            && class.is_retryable()
            && breaker.state() != BreakerState::Open
    }

    /// Backoff before retry number `retry_count` (0-based):
    /// `min(base * multiplier^n, max)`. Monotonically non-decreasing in `n`.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        let factor = self
            .config
            .multiplier
            .max(1.0)
            .powi(i32::try_from(retry_count).unwrap_or(i32::MAX));
        let ms = (self.config.base_delay_ms as f64 * factor).min(self.config.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}
