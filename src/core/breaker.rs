//! Circuit breakers guarding the engine's external dependencies.
//!
//! One breaker exists per logical dependency name, not per task, so a run of
//! failures against the content service protects every subsequent call to it.
//! Breaker state is process-local, owned by the scheduler instance that
//! created the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::error::{ErrorClass, OrchestratorError};

/// Dependency name for the content-generation service.
pub const CONTENT_SERVICE: &str = "content-service";
/// Dependency name for the job store.
pub const JOB_STORE: &str = "job-store";

/// Tuning knobs for a circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive counted failures that trip the breaker open.
    pub failure_threshold: u32,
    /// How long an open breaker rejects calls before admitting a probe.
    pub reset_timeout_ms: u64,
    /// Probe budget while half-open; that many consecutive successes close.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 4,
            reset_timeout_ms: 60_000,
            half_open_max_calls: 2,
        }
    }
}

impl BreakerConfig {
    /// Reset timeout as a [`Duration`].
    #[must_use]
    pub const fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Observable breaker state (classic three-state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Requests pass through; failures are counted.
    Closed,
    /// All calls short-circuit until the reset timeout passes.
    Open,
    /// A limited number of probe calls are admitted.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure_ms: Option<u128>,
    next_attempt_ms: Option<u128>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

/// Failure-isolation state machine for one named dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for a dependency.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_ms: None,
                next_attempt_ms: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
            }),
        }
    }

    /// Name of the guarded dependency.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Counted failures since the breaker last closed.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Timestamp of the most recent counted failure, if any.
    #[must_use]
    pub fn last_failure_ms(&self) -> Option<u128> {
        self.inner.lock().last_failure_ms
    }

    /// Admit or short-circuit a call at time `now_ms`.
    ///
    /// An open breaker whose reset timeout has elapsed transitions to
    /// half-open and admits the caller as a probe.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::CircuitOpen`] when the call must not proceed.
    pub fn acquire(&self, now_ms: u128) -> Result<(), OrchestratorError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let next = inner.next_attempt_ms.unwrap_or(now_ms);
                if now_ms >= next {
                    tracing::info!(breaker = %self.name, "reset timeout elapsed, half-open");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_in_flight = 1;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    Err(OrchestratorError::CircuitOpen {
                        dependency: self.name.clone(),
                        retry_after_ms: next - now_ms,
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight + inner.half_open_successes
                    < self.config.half_open_max_calls
                {
                    inner.half_open_in_flight += 1;
                    Ok(())
                } else {
                    // Probe budget spent; wait for the probes to settle.
                    Err(OrchestratorError::CircuitOpen {
                        dependency: self.name.clone(),
                        retry_after_ms: u128::from(self.config.reset_timeout_ms),
                    })
                }
            }
        }
    }

    /// Return an admission that never turned into a call (e.g. the task lost
    /// its claim race), so a half-open probe slot is not leaked.
    pub fn release_unused(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_max_calls {
                    tracing::info!(breaker = %self.name, "probes succeeded, closing");
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.next_attempt_ms = None;
                    inner.half_open_in_flight = 0;
                    inner.half_open_successes = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call at time `now_ms`.
    ///
    /// Only dependency-level classes count toward the threshold; a
    /// validation or auth failure leaves the breaker untouched.
    pub fn record_failure(&self, class: ErrorClass, now_ms: u128) {
        if !class.counts_toward_breaker() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.last_failure_ms = Some(now_ms);
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.next_attempt_ms =
                        Some(now_ms + u128::from(self.config.reset_timeout_ms));
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "threshold reached, opening"
                    );
                }
            }
            BreakerState::HalfOpen => {
                // Any probe failure reopens immediately.
                inner.state = BreakerState::Open;
                inner.failure_count += 1;
                inner.next_attempt_ms = Some(now_ms + u128::from(self.config.reset_timeout_ms));
                inner.half_open_in_flight = 0;
                inner.half_open_successes = 0;
                tracing::warn!(breaker = %self.name, "probe failed, reopening");
            }
            BreakerState::Open => {}
        }
    }
}

/// Registry of named breakers, one per external dependency.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry; breakers are created lazily on first use.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the breaker for a dependency name.
    #[must_use]
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
            .clone()
    }
}
