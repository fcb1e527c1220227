//! Tests for circuit breaker state transitions

use coursegen::core::{
    BreakerConfig, BreakerRegistry, BreakerState, CircuitBreaker, ErrorClass, OrchestratorError,
};

fn test_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        reset_timeout_ms: 1000,
        half_open_max_calls: 2,
    }
}

#[test]
fn test_starts_closed() {
    let b = CircuitBreaker::new("content-service", test_config());
    assert_eq!(b.state(), BreakerState::Closed);
    assert!(b.acquire(0).is_ok());
}

#[test]
fn test_opens_at_failure_threshold() {
    let b = CircuitBreaker::new("content-service", test_config());
    b.record_failure(ErrorClass::Timeout, 10);
    b.record_failure(ErrorClass::Network, 20);
    assert_eq!(b.state(), BreakerState::Closed);
    b.record_failure(ErrorClass::Temporary, 30);
    assert_eq!(b.state(), BreakerState::Open);
}

#[test]
fn test_open_rejects_with_retry_hint() {
    let b = CircuitBreaker::new("content-service", test_config());
    for i in 0..3 {
        b.record_failure(ErrorClass::Timeout, i * 10);
    }
    let err = b.acquire(50).unwrap_err();
    match err {
        OrchestratorError::CircuitOpen {
            dependency,
            retry_after_ms,
        } => {
            assert_eq!(dependency, "content-service");
            assert!(retry_after_ms > 0);
        }
        other => panic!("expected CircuitOpen, got {other}"),
    }
}

#[test]
fn test_validation_errors_do_not_trip_breaker() {
    let b = CircuitBreaker::new("content-service", test_config());
    for i in 0..10 {
        b.record_failure(ErrorClass::Validation, i * 10);
    }
    assert_eq!(b.state(), BreakerState::Closed);
    assert_eq!(b.failure_count(), 0);
}

#[test]
fn test_half_open_after_reset_timeout() {
    let b = CircuitBreaker::new("content-service", test_config());
    for i in 0..3 {
        b.record_failure(ErrorClass::Timeout, i);
    }
    // Past the reset timeout the first acquire is admitted as a probe.
    assert!(b.acquire(5000).is_ok());
    assert_eq!(b.state(), BreakerState::HalfOpen);
}

#[test]
fn test_half_open_probe_budget_is_bounded() {
    let cfg = test_config();
    let b = CircuitBreaker::new("content-service", cfg);
    for i in 0..3 {
        b.record_failure(ErrorClass::Timeout, i);
    }
    assert!(b.acquire(5000).is_ok());
    assert!(b.acquire(5001).is_ok());
    // Third concurrent probe exceeds half_open_max_calls.
    assert!(b.acquire(5002).is_err());
}

#[test]
fn test_release_unused_returns_probe_slot() {
    let b = CircuitBreaker::new("content-service", test_config());
    for i in 0..3 {
        b.record_failure(ErrorClass::Timeout, i);
    }
    assert!(b.acquire(5000).is_ok());
    assert!(b.acquire(5001).is_ok());
    assert!(b.acquire(5002).is_err());
    b.release_unused();
    assert!(b.acquire(5003).is_ok());
}

#[test]
fn test_successful_probes_close_the_breaker() {
    let b = CircuitBreaker::new("content-service", test_config());
    for i in 0..3 {
        b.record_failure(ErrorClass::Timeout, i);
    }
    assert!(b.acquire(5000).is_ok());
    b.record_success();
    assert!(b.acquire(5001).is_ok());
    b.record_success();
    assert_eq!(b.state(), BreakerState::Closed);
    assert_eq!(b.failure_count(), 0);
}

#[test]
fn test_half_open_failure_reopens_immediately() {
    let b = CircuitBreaker::new("content-service", test_config());
    for i in 0..3 {
        b.record_failure(ErrorClass::Timeout, i);
    }
    assert!(b.acquire(5000).is_ok());
    b.record_failure(ErrorClass::Network, 5010);
    assert_eq!(b.state(), BreakerState::Open);
    assert!(b.acquire(5020).is_err());
}

#[test]
fn test_success_resets_closed_failure_count() {
    let b = CircuitBreaker::new("content-service", test_config());
    b.record_failure(ErrorClass::Timeout, 10);
    b.record_failure(ErrorClass::Timeout, 20);
    b.record_success();
    assert_eq!(b.failure_count(), 0);
    assert_eq!(b.state(), BreakerState::Closed);
}

#[test]
fn test_registry_returns_same_instance_per_name() {
    let registry = BreakerRegistry::new(test_config());
    let a = registry.breaker("content-service");
    let b = registry.breaker("content-service");
    let c = registry.breaker("job-store");
    a.record_failure(ErrorClass::Timeout, 10);
    assert_eq!(b.failure_count(), 1);
    assert_eq!(c.failure_count(), 0);
}
