//! Error types and the failure-classification taxonomy.
//!
//! Every failure that flows through the engine is classified into an
//! [`ErrorClass`]. The class decides three independent questions: whether the
//! failure is retryable, whether it counts toward a circuit breaker, and what
//! severity it carries for user-facing messaging.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a task failure.
///
/// Dependency-level classes (timeout, rate limit, network, temporary) are
/// retryable and trip circuit breakers. Caller-level classes (validation,
/// auth, insufficient resources) fail fast: retrying a malformed prompt or an
/// expired credential only wastes budget, and such failures must never punish
/// the shared dependency by opening its breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The upstream call exceeded its deadline.
    Timeout,
    /// The upstream rejected the call for throughput reasons.
    RateLimit,
    /// Connection-level failure (reset, refused, DNS).
    Network,
    /// Transient upstream fault, e.g. a 5xx response.
    Temporary,
    /// The request payload was rejected as malformed.
    Validation,
    /// Authentication or authorization failure.
    Auth,
    /// The system lacks resources to run the task at all.
    InsufficientResources,
}

impl ErrorClass {
    /// Whether a failure of this class may be retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimit | Self::Network | Self::Temporary
        )
    }

    /// Whether a failure of this class counts toward a circuit breaker.
    ///
    /// Only dependency-level failures count. A validation error says nothing
    /// about the health of the dependency.
    #[must_use]
    pub const fn counts_toward_breaker(self) -> bool {
        self.is_retryable()
    }

    /// Default severity for failures of this class.
    #[must_use]
    pub const fn severity(self) -> ErrorSeverity {
        match self {
            Self::RateLimit | Self::Temporary => ErrorSeverity::Low,
            Self::Timeout | Self::Network => ErrorSeverity::Medium,
            Self::Validation | Self::Auth => ErrorSeverity::High,
            Self::InsufficientResources => ErrorSeverity::Critical,
        }
    }
}

/// Severity of a recorded task error. Drives user-facing messaging; does not
/// itself gate retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Routine transient noise.
    Low,
    /// Degraded but self-healing.
    Medium,
    /// Needs caller attention.
    High,
    /// Needs operator attention.
    Critical,
}

/// Failure returned by a content generator call.
#[derive(Debug, Clone, Error)]
#[error("{class:?} error from content generator: {message}")]
pub struct GenerateError {
    /// Classified failure kind.
    pub class: ErrorClass,
    /// Human-readable detail. Internal; never surfaced verbatim to end users.
    pub message: String,
}

impl GenerateError {
    /// Build an error with an explicit class.
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// Deadline-exceeded failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Timeout, message)
    }

    /// Connection-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Network, message)
    }

    /// Transient upstream fault (5xx).
    pub fn temporary(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Temporary, message)
    }

    /// Malformed-request failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Validation, message)
    }
}

/// Errors produced by the orchestration engine.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No job with the given id exists in the store.
    #[error("job not found: {0}")]
    JobNotFound(String),
    /// No task with the given id exists in the store.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// A circuit breaker is open; the call was short-circuited.
    #[error("circuit open for `{dependency}`, retry after {retry_after_ms}ms")]
    CircuitOpen {
        /// Name of the guarded dependency.
        dependency: String,
        /// Milliseconds until the breaker will admit a probe.
        retry_after_ms: u128,
    },
    /// Admission was denied by the rate limiter.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Specific, actionable denial reason.
        reason: String,
        /// Milliseconds after which admission may succeed.
        retry_after_ms: u128,
    },
    /// Job store operation failed.
    #[error("store error: {0}")]
    Store(String),
    /// All guaranteed-write fallback strategies were exhausted.
    #[error("status write exhausted all fallbacks for task {0}")]
    WriteExhausted(String),
    /// The job reached its recovery-attempt ceiling.
    #[error("recovery attempts exhausted for job {0}")]
    RecoveryExhausted(String),
    /// The job terminated as failed.
    #[error("job {job_id} failed: {reason}")]
    JobFailed {
        /// Failed job id.
        job_id: String,
        /// Terminal failure reason.
        reason: String,
    },
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
