//! Tests for error classification

use coursegen::core::{ErrorClass, ErrorSeverity, GenerateError, OrchestratorError};

#[test]
fn test_retryable_classes() {
    assert!(ErrorClass::Timeout.is_retryable());
    assert!(ErrorClass::RateLimit.is_retryable());
    assert!(ErrorClass::Network.is_retryable());
    assert!(ErrorClass::Temporary.is_retryable());
}

#[test]
fn test_permanent_classes() {
    assert!(!ErrorClass::Validation.is_retryable());
    assert!(!ErrorClass::Auth.is_retryable());
    assert!(!ErrorClass::InsufficientResources.is_retryable());
}

#[test]
fn test_breaker_counting_matches_retryability() {
    for class in [
        ErrorClass::Timeout,
        ErrorClass::RateLimit,
        ErrorClass::Network,
        ErrorClass::Temporary,
        ErrorClass::Validation,
        ErrorClass::Auth,
        ErrorClass::InsufficientResources,
    ] {
        assert_eq!(class.counts_toward_breaker(), class.is_retryable());
    }
}

#[test]
fn test_validation_severity_is_not_critical() {
    assert_ne!(ErrorClass::Validation.severity(), ErrorSeverity::Critical);
}

#[test]
fn test_generate_error_constructors_carry_class() {
    assert_eq!(GenerateError::timeout("t").class, ErrorClass::Timeout);
    assert_eq!(GenerateError::network("n").class, ErrorClass::Network);
    assert_eq!(GenerateError::temporary("x").class, ErrorClass::Temporary);
    assert_eq!(GenerateError::validation("v").class, ErrorClass::Validation);
}

#[test]
fn test_orchestrator_error_display() {
    let e = OrchestratorError::CircuitOpen {
        dependency: "content-service".to_owned(),
        retry_after_ms: 5000,
    };
    let msg = e.to_string();
    assert!(msg.contains("content-service"));
    assert!(msg.contains("5000"));
}

#[test]
fn test_rate_limited_error_display() {
    let e = OrchestratorError::RateLimited {
        reason: "too many requests".to_owned(),
        retry_after_ms: 1000,
    };
    assert!(e.to_string().contains("too many requests"));
}
