//! Tests for rate limiter admission control

use coursegen::core::limiter::DenyReason;
use coursegen::core::{RateLimitConfig, RateLimiter, Role};

const MINUTE_MS: u128 = 60_000;

#[test]
fn test_student_admitted_within_limits() {
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    let admission = limiter.admit("alice", Role::Student, 0);
    assert!(admission.allowed);
    assert!(admission.reason.is_none());
    assert_eq!(limiter.active_jobs("alice"), 1);
}

#[test]
fn test_student_concurrency_ceiling() {
    // Default student limit is 1 concurrent job.
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    assert!(limiter.admit("alice", Role::Student, 0).allowed);
    let denied = limiter.admit("alice", Role::Student, 1);
    assert!(!denied.allowed);
    assert_eq!(denied.reason, Some(DenyReason::UserConcurrency));
}

#[test]
fn test_concurrency_checked_before_rate_windows() {
    // Exhaust the minute window and hold a job; the denial must still name
    // concurrency, not the rate window.
    let mut config = RateLimitConfig::default();
    config.student.requests_per_minute = 1;
    let limiter = RateLimiter::new(config, 0);
    assert!(limiter.admit("alice", Role::Student, 0).allowed);
    let denied = limiter.admit("alice", Role::Student, 1);
    assert_eq!(denied.reason, Some(DenyReason::UserConcurrency));
}

#[test]
fn test_minute_window_denial_and_lazy_reset() {
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    // Student: 2 per minute; release between starts to keep concurrency free.
    for _ in 0..2 {
        assert!(limiter.admit("alice", Role::Student, 0).allowed);
        limiter.release("alice");
    }
    let denied = limiter.admit("alice", Role::Student, 1000);
    assert!(!denied.allowed);
    assert_eq!(denied.reason, Some(DenyReason::MinuteRate));
    let retry_after = denied.retry_after.unwrap();
    assert!(retry_after.as_millis() > 0);
    assert!(retry_after.as_millis() <= MINUTE_MS);

    // A minute later the window has rolled over.
    let after = limiter.admit("alice", Role::Student, MINUTE_MS + 1);
    assert!(after.allowed);
}

#[test]
fn test_hour_window_outlives_minute_window() {
    let mut config = RateLimitConfig::default();
    config.student.requests_per_minute = 100;
    config.student.requests_per_hour = 3;
    config.student.max_concurrent_jobs = 100;
    let limiter = RateLimiter::new(config, 0);
    for _ in 0..3 {
        assert!(limiter.admit("alice", Role::Student, 0).allowed);
    }
    // Minute rollover does not help; the hour window still holds the count.
    let denied = limiter.admit("alice", Role::Student, MINUTE_MS * 2);
    assert_eq!(denied.reason, Some(DenyReason::HourRate));
}

#[test]
fn test_roles_have_independent_tables() {
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    // Instructor allows 3 concurrent jobs where a student gets 1.
    for _ in 0..3 {
        assert!(limiter.admit("bob", Role::Instructor, 0).allowed);
    }
    assert!(!limiter.admit("bob", Role::Instructor, 0).allowed);
}

#[test]
fn test_global_concurrency_ceiling() {
    let mut config = RateLimitConfig::default();
    config.global.max_concurrent_jobs = 2;
    config.global.max_starts_per_minute = 100;
    let limiter = RateLimiter::new(config, 0);
    assert!(limiter.admit("u1", Role::Admin, 0).allowed);
    assert!(limiter.admit("u2", Role::Admin, 0).allowed);
    let denied = limiter.admit("u3", Role::Admin, 0);
    assert_eq!(denied.reason, Some(DenyReason::GlobalConcurrency));
    assert_eq!(limiter.global_active_jobs(), 2);
}

#[test]
fn test_global_start_rate() {
    let mut config = RateLimitConfig::default();
    config.global.max_starts_per_minute = 2;
    let limiter = RateLimiter::new(config, 0);
    assert!(limiter.admit("u1", Role::Admin, 0).allowed);
    limiter.release("u1");
    assert!(limiter.admit("u2", Role::Admin, 0).allowed);
    limiter.release("u2");
    let denied = limiter.admit("u3", Role::Admin, 0);
    assert_eq!(denied.reason, Some(DenyReason::GlobalStartRate));
    assert!(denied.retry_after.is_some());
}

#[test]
fn test_release_frees_concurrency_slot() {
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    assert!(limiter.admit("alice", Role::Student, 0).allowed);
    limiter.release("alice");
    assert_eq!(limiter.active_jobs("alice"), 0);
    assert_eq!(limiter.global_active_jobs(), 0);
    assert!(limiter.admit("alice", Role::Student, 1).allowed);
}

#[test]
fn test_spurious_release_does_not_free_global_capacity() {
    let mut config = RateLimitConfig::default();
    config.global.max_concurrent_jobs = 1;
    config.global.max_starts_per_minute = 100;
    let limiter = RateLimiter::new(config, 0);
    assert!(limiter.admit("alice", Role::Admin, 0).allowed);

    // A user who was never admitted releases nothing, globally included.
    limiter.release("ghost");
    assert_eq!(limiter.global_active_jobs(), 1);
    let denied = limiter.admit("bob", Role::Admin, 0);
    assert_eq!(denied.reason, Some(DenyReason::GlobalConcurrency));

    limiter.release("alice");
    assert!(limiter.admit("bob", Role::Admin, 1).allowed);
}

#[test]
fn test_release_never_underflows() {
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    limiter.release("ghost");
    limiter.release("ghost");
    assert_eq!(limiter.active_jobs("ghost"), 0);
    assert_eq!(limiter.global_active_jobs(), 0);
    assert!(limiter.admit("ghost", Role::Student, 0).allowed);
}

#[test]
fn test_denials_do_not_consume_quota() {
    let limiter = RateLimiter::new(RateLimitConfig::default(), 0);
    assert!(limiter.admit("alice", Role::Student, 0).allowed);
    for _ in 0..5 {
        assert!(!limiter.admit("alice", Role::Student, 1).allowed);
    }
    limiter.release("alice");
    // One start used this minute; the second of two is still available.
    assert!(limiter.admit("alice", Role::Student, 2).allowed);
}

#[test]
fn test_deny_reasons_have_user_messages() {
    for reason in [
        DenyReason::UserConcurrency,
        DenyReason::GlobalConcurrency,
        DenyReason::GlobalStartRate,
        DenyReason::MinuteRate,
        DenyReason::HourRate,
        DenyReason::DayRate,
    ] {
        assert!(!reason.user_message().is_empty());
    }
}
