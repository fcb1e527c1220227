//! Tests for configuration validation

use coursegen::config::OrchestratorConfig;

#[test]
fn test_default_config_is_valid() {
    assert!(OrchestratorConfig::default().validate().is_ok());
}

#[test]
fn test_zero_batch_size_rejected() {
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.batch_size = 0;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("batch_size"));
}

#[test]
fn test_zero_write_attempts_rejected() {
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.write_attempts = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_multiplier_below_one_rejected() {
    let mut cfg = OrchestratorConfig::default();
    cfg.retry.multiplier = 0.5;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("multiplier"));
}

#[test]
fn test_delay_cap_below_base_rejected() {
    let mut cfg = OrchestratorConfig::default();
    cfg.retry.base_delay_ms = 5000;
    cfg.retry.max_delay_ms = 1000;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_unordered_monitor_thresholds_rejected() {
    let mut cfg = OrchestratorConfig::default();
    cfg.monitor.stalled_after_ms = 60_000;
    cfg.monitor.stuck_after_ms = 30_000;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("monitor"));
}

#[test]
fn test_unordered_role_windows_rejected() {
    let mut cfg = OrchestratorConfig::default();
    cfg.limits.student.requests_per_minute = 50;
    cfg.limits.student.requests_per_hour = 10;
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("student"));
}

#[test]
fn test_from_json_empty_object_uses_defaults() {
    let cfg = OrchestratorConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg.scheduler.batch_size, 10);
    assert_eq!(cfg.retry.default_max_retries, 3);
}

#[test]
fn test_from_json_partial_override() {
    let cfg = OrchestratorConfig::from_json_str(
        r#"{"scheduler": {"batch_size": 4}, "breaker": {"failure_threshold": 7}}"#,
    )
    .unwrap();
    assert_eq!(cfg.scheduler.batch_size, 4);
    assert_eq!(cfg.breaker.failure_threshold, 7);
    // Untouched sections keep their defaults.
    assert_eq!(cfg.scheduler.max_concurrent_tasks, 5);
}

#[test]
fn test_from_json_rejects_invalid_values() {
    let result = OrchestratorConfig::from_json_str(r#"{"scheduler": {"batch_size": 0}}"#);
    assert!(result.is_err());
}

#[test]
fn test_from_json_rejects_malformed_input() {
    assert!(OrchestratorConfig::from_json_str("not json").is_err());
}
