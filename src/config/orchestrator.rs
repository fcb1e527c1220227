//! Root configuration: one struct composing every engine knob, parseable
//! from JSON and validated before use.

use serde::{Deserialize, Serialize};

use crate::core::breaker::BreakerConfig;
use crate::core::limiter::{RateLimitConfig, RoleLimits};
use crate::core::monitor::MonitorConfig;
use crate::core::retry::RetryConfig;
use crate::core::scheduler::SchedulerConfig;

/// Root orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Scheduler loop knobs.
    pub scheduler: SchedulerConfig,
    /// Circuit breaker knobs, shared by every dependency breaker.
    pub breaker: BreakerConfig,
    /// Retry/backoff knobs.
    pub retry: RetryConfig,
    /// Per-role and global admission ceilings.
    pub limits: RateLimitConfig,
    /// Health thresholds and the recovery ceiling.
    pub monitor: MonitorConfig,
}

impl OrchestratorConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// A message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.batch_size == 0 {
            return Err("scheduler.batch_size must be greater than 0".into());
        }
        if self.scheduler.max_concurrent_tasks == 0 {
            return Err("scheduler.max_concurrent_tasks must be greater than 0".into());
        }
        if self.scheduler.task_timeout_ms == 0 {
            return Err("scheduler.task_timeout_ms must be greater than 0".into());
        }
        if self.scheduler.write_attempts == 0 {
            return Err("scheduler.write_attempts must be greater than 0".into());
        }
        if self.breaker.failure_threshold == 0 {
            return Err("breaker.failure_threshold must be greater than 0".into());
        }
        if self.breaker.half_open_max_calls == 0 {
            return Err("breaker.half_open_max_calls must be greater than 0".into());
        }
        if self.retry.multiplier < 1.0 {
            return Err("retry.multiplier must be at least 1.0".into());
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err("retry.max_delay_ms must not be below retry.base_delay_ms".into());
        }
        if !(self.monitor.stalled_after_ms <= self.monitor.stuck_after_ms
            && self.monitor.stuck_after_ms <= self.monitor.abandoned_after_ms)
        {
            return Err("monitor thresholds must be ordered stalled <= stuck <= abandoned".into());
        }
        for (name, role) in [
            ("student", &self.limits.student),
            ("instructor", &self.limits.instructor),
            ("admin", &self.limits.admin),
        ] {
            validate_role(name, role)?;
        }
        if self.limits.global.max_concurrent_jobs == 0 {
            return Err("limits.global.max_concurrent_jobs must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Parse or validation failure, as a message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn validate_role(name: &str, limits: &RoleLimits) -> Result<(), String> {
    if limits.max_concurrent_jobs == 0 {
        return Err(format!("limits.{name}.max_concurrent_jobs must be greater than 0"));
    }
    if limits.requests_per_minute == 0 {
        return Err(format!("limits.{name}.requests_per_minute must be greater than 0"));
    }
    if limits.requests_per_minute > limits.requests_per_hour
        || limits.requests_per_hour > limits.requests_per_day
    {
        return Err(format!(
            "limits.{name} windows must be ordered minute <= hour <= day"
        ));
    }
    Ok(())
}
