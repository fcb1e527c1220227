//! Job and task entities, status state machines, and transition rules.

use serde::{Deserialize, Serialize};

use crate::core::error::ErrorSeverity;
use crate::util::clock::now_ms;

/// Unique job identifier (uuid-backed, serialized as a plain string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a fresh random job id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// View as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique task identifier.
///
/// Task ids are deterministic, human-readable strings of the form
/// `"{type}-{scope}-{index}"` assigned during graph construction, so
/// re-running construction for the same outline is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// View as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, not yet picked up by a scheduler.
    Queued,
    /// A scheduler loop is driving this job.
    Processing,
    /// All work finished; terminal.
    Completed,
    /// Terminal failure.
    Failed,
    /// Externally cancelled; the scheduler stops cooperatively.
    Cancelled,
    /// Externally paused; the scheduler stops cooperatively and the job can
    /// be resumed later.
    Paused,
}

impl JobStatus {
    /// Whether this status ends the job's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One end-to-end content-generation request composed of many tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier.
    pub id: JobId,
    /// Owning user.
    pub user_id: String,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Aggregate progress, 0-100.
    pub progress: u8,
    /// Creation timestamp (ms since epoch).
    pub created_at_ms: u128,
    /// Last mutation timestamp (ms since epoch).
    pub updated_at_ms: u128,
    /// How many automatic recoveries have been attempted.
    pub recovery_attempts: u32,
    /// Ceiling on automatic recoveries before requiring manual intervention.
    pub max_recovery_attempts: u32,
    /// Terminal failure reason, if the job failed.
    pub error_message: Option<String>,
}

impl Job {
    /// Create a freshly submitted job for a user.
    #[must_use]
    pub fn new(user_id: impl Into<String>, max_recovery_attempts: u32) -> Self {
        let now = now_ms();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            status: JobStatus::Queued,
            progress: 0,
            created_at_ms: now,
            updated_at_ms: now,
            recovery_attempts: 0,
            max_recovery_attempts,
            error_message: None,
        }
    }
}

/// The closed set of work kinds the engine dispatches.
///
/// Each variant has a handler wired in the content pipeline; the match is
/// exhaustive, so adding a variant forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Lesson section text.
    Section,
    /// Per-lesson assessment.
    Assessment,
    /// Per-module quiz, built from the module's assessments.
    ModuleQuiz,
    /// Per-learning-path quiz, built from the path's module quizzes.
    PathQuiz,
    /// Final class exam.
    Exam,
    /// Auxiliary media variant for a lesson.
    Media,
}

impl TaskType {
    /// Priority band for this task class. Lower runs first among ready tasks:
    /// cheap upstream content before expensive downstream aggregates, media
    /// last so it never blocks anything.
    #[must_use]
    pub const fn priority_band(self) -> i32 {
        match self {
            Self::Section => 10,
            Self::Assessment => 20,
            Self::ModuleQuiz => 30,
            Self::PathQuiz => 35,
            Self::Exam => 40,
            Self::Media => 50,
        }
    }

    /// Stable name used in deterministic task ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Assessment => "assessment",
            Self::ModuleQuiz => "quiz",
            Self::PathQuiz => "path-quiz",
            Self::Exam => "exam",
            Self::Media => "media",
        }
    }
}

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, dependencies may not be satisfied yet.
    Pending,
    /// Ready to be claimed by a scheduler batch.
    Queued,
    /// Claimed and executing.
    Running,
    /// Finished successfully; terminal.
    Completed,
    /// Failed; terminal unless promoted to `Retrying`.
    Failed,
    /// Explicitly skipped by external action; terminal.
    Skipped,
    /// Waiting out a retry backoff before re-queueing.
    Retrying,
    /// Explicitly cancelled by external action; terminal.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status ends the task's lifecycle.
    ///
    /// `Failed` is terminal here; the retry path moves a task through
    /// `Retrying` explicitly before the task ever counts as live again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Whether a dependency in this status unblocks its dependents.
    ///
    /// `Failed` satisfies dependents on purpose: one failed lesson must not
    /// stall its siblings or the rest of the course. This is a deliberate
    /// best-effort policy, asserted by tests.
    #[must_use]
    pub const fn satisfies_dependents(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed)
    }

    /// Whether the transition `self -> to` is legal.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Queued)
                | (Self::Pending | Self::Queued, Self::Skipped | Self::Cancelled)
                | (Self::Pending | Self::Queued, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed | Self::Retrying)
                | (Self::Failed, Self::Retrying)
                | (Self::Retrying, Self::Queued | Self::Cancelled)
        )
    }
}

/// One unit of work: a single content-generation call with declared
/// dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Deterministic identifier, unique within the job.
    pub id: TaskId,
    /// Owning job.
    pub job_id: JobId,
    /// Work kind.
    pub task_type: TaskType,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Ordered ids of tasks that must reach a terminal status first.
    pub dependencies: Vec<TaskId>,
    /// Lower runs first among ready tasks (soft ordering).
    pub execution_priority: i32,
    /// Retries consumed so far.
    pub current_retry_count: u32,
    /// Retry budget.
    pub max_retry_count: u32,
    /// Opaque generator input.
    pub input_data: serde_json::Value,
    /// Opaque generator output, present once completed.
    pub output_data: Option<serde_json::Value>,
    /// Last recorded failure, internal form.
    pub error_message: Option<String>,
    /// Severity of the last recorded failure.
    pub error_severity: Option<ErrorSeverity>,
    /// Whether the last failure is considered recoverable.
    pub is_recoverable: bool,
    /// Creation timestamp (ms since epoch).
    pub created_at_ms: u128,
    /// Last mutation timestamp (ms since epoch).
    pub updated_at_ms: u128,
    /// When the task last entered `Running`, for stall detection.
    pub started_at_ms: Option<u128>,
    /// Earliest time a `Retrying` task may be re-queued.
    pub next_attempt_at_ms: Option<u128>,
}

impl Task {
    /// Create a pending task with the given identity and graph position.
    #[must_use]
    pub fn new(
        id: TaskId,
        job_id: JobId,
        task_type: TaskType,
        dependencies: Vec<TaskId>,
        input_data: serde_json::Value,
        max_retry_count: u32,
    ) -> Self {
        let now = now_ms();
        Self {
            id,
            job_id,
            task_type,
            status: TaskStatus::Pending,
            dependencies,
            execution_priority: task_type.priority_band(),
            current_retry_count: 0,
            max_retry_count,
            input_data,
            output_data: None,
            error_message: None,
            error_severity: None,
            is_recoverable: true,
            created_at_ms: now,
            updated_at_ms: now,
            started_at_ms: None,
            next_attempt_at_ms: None,
        }
    }

    /// Whether the task can still be claimed by a scheduler batch.
    #[must_use]
    pub const fn is_schedulable(&self) -> bool {
        matches!(self.status, TaskStatus::Pending | TaskStatus::Queued)
    }
}

/// Partial update applied alongside an atomic status transition.
///
/// Only `Some` fields are written; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFields {
    /// New generator output.
    pub output_data: Option<serde_json::Value>,
    /// New failure message.
    pub error_message: Option<String>,
    /// New failure severity.
    pub error_severity: Option<ErrorSeverity>,
    /// New recoverability flag.
    pub is_recoverable: Option<bool>,
    /// New retry counter value.
    pub current_retry_count: Option<u32>,
    /// New start timestamp; `Some(None)` clears it.
    pub started_at_ms: Option<Option<u128>>,
    /// New backoff gate; `Some(None)` clears it.
    pub next_attempt_at_ms: Option<Option<u128>>,
}

impl TaskFields {
    /// Fields recorded when a task starts running.
    #[must_use]
    pub fn started(now: u128) -> Self {
        Self {
            started_at_ms: Some(Some(now)),
            ..Self::default()
        }
    }

    /// Fields recorded on successful completion.
    #[must_use]
    pub fn completed(output: serde_json::Value) -> Self {
        Self {
            output_data: Some(output),
            started_at_ms: Some(None),
            next_attempt_at_ms: Some(None),
            ..Self::default()
        }
    }

    /// Fields recorded on failure.
    #[must_use]
    pub fn failed(message: String, severity: ErrorSeverity, recoverable: bool) -> Self {
        Self {
            error_message: Some(message),
            error_severity: Some(severity),
            is_recoverable: Some(recoverable),
            started_at_ms: Some(None),
            ..Self::default()
        }
    }
}
