//! The narrow job-store interface the engine consumes.
//!
//! The real system persists jobs and tasks in a relational store; the engine
//! only ever touches it through this trait. Every method takes `&self` and
//! must be safe to call concurrently. The one primitive the engine's
//! correctness leans on is [`JobStore::compare_and_set_task_status`]: an
//! atomic conditional update that succeeds only when the stored status still
//! matches the expected one.

pub mod memory;

use async_trait::async_trait;

use crate::core::error::OrchestratorError;
use crate::core::job::{Job, JobId, JobStatus, Task, TaskFields, TaskId, TaskStatus};

/// CRUD plus atomic compare-and-set over job and task records.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Persist a freshly submitted job.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Store`] on backend failure.
    async fn create_job(&self, job: Job) -> Result<(), OrchestratorError>;

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] when no such job exists.
    async fn get_job(&self, job_id: &JobId) -> Result<Job, OrchestratorError>;

    /// Set a job's lifecycle status and optional terminal error message.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] when no such job exists.
    async fn set_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), OrchestratorError>;

    /// Set a job's aggregate progress (0-100).
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] when no such job exists.
    async fn update_job_progress(&self, job_id: &JobId, percent: u8)
        -> Result<(), OrchestratorError>;

    /// Atomically bump the recovery-attempt counter, returning the new value.
    ///
    /// Incremented before any recovery work runs, so a crash mid-recovery
    /// still counts against the ceiling.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] when no such job exists.
    async fn increment_recovery_attempts(&self, job_id: &JobId)
        -> Result<u32, OrchestratorError>;

    /// Persist a batch of tasks (graph construction).
    ///
    /// Idempotent on id: a task whose id already exists is left untouched,
    /// so re-running graph construction cannot duplicate or reset work.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Store`] on backend failure.
    async fn create_tasks(&self, tasks: Vec<Task>) -> Result<(), OrchestratorError>;

    /// Fetch a job's tasks, optionally filtered by status, ordered by
    /// `execution_priority` then id.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Store`] on backend failure.
    async fn get_tasks(
        &self,
        job_id: &JobId,
        status_filter: Option<TaskStatus>,
    ) -> Result<Vec<Task>, OrchestratorError>;

    /// Fetch a single task by id.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::TaskNotFound`] when no such task exists.
    async fn get_task(&self, task_id: &TaskId) -> Result<Task, OrchestratorError>;

    /// Atomic conditional status transition: apply `new_status` and `fields`
    /// only if the stored status equals `expected`. Returns whether the
    /// update won. This is the engine's optimistic lock: tasks that lose the
    /// race are simply left for the next poll.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::TaskNotFound`] when no such task exists.
    async fn compare_and_set_task_status(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        new_status: TaskStatus,
        fields: TaskFields,
    ) -> Result<bool, OrchestratorError>;

    /// Unconditional status and field update. First fallback of the
    /// guaranteed-write chain.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::TaskNotFound`] when no such task exists.
    async fn update_task_fields(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        fields: TaskFields,
    ) -> Result<(), OrchestratorError>;

    /// Minimal status-only update. Last fallback of the guaranteed-write
    /// chain.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::TaskNotFound`] when no such task exists.
    async fn set_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<(), OrchestratorError>;

    /// Delete all of a job's tasks (job restart only).
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Store`] on backend failure.
    async fn delete_tasks(&self, job_id: &JobId) -> Result<usize, OrchestratorError>;
}
