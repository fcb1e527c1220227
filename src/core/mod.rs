//! Core domain model and engine.

pub mod breaker;
pub mod error;
pub mod generator;
pub mod graph;
pub mod job;
pub mod limiter;
pub mod monitor;
pub mod retry;
pub mod scheduler;

pub use breaker::{BreakerConfig, BreakerRegistry, BreakerState, CircuitBreaker};
pub use error::{AppResult, ErrorClass, ErrorSeverity, GenerateError, OrchestratorError};
pub use generator::{CachingGenerator, ContentGenerator};
pub use graph::{build_tasks, dependencies_satisfied, CourseOutline};
pub use job::{Job, JobId, JobStatus, Task, TaskFields, TaskId, TaskStatus, TaskType};
pub use limiter::{Admission, RateLimitConfig, RateLimiter, Role};
pub use monitor::{
    classify, HealthState, JobHealth, MonitorConfig, RecommendedAction, RecoveryResult,
    ResilienceMonitor,
};
pub use retry::{RetryConfig, RetryPolicy};
pub use scheduler::{progress_percent, Scheduler, SchedulerConfig, Spawn};
