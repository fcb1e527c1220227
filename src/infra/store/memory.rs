//! In-memory job store with real compare-and-set semantics.
//!
//! Reference backend for development and tests. All state sits behind
//! `parking_lot` mutexes; no lock is ever held across an await point.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::OrchestratorError;
use crate::core::job::{Job, JobId, JobStatus, Task, TaskFields, TaskId, TaskStatus};
use crate::infra::store::JobStore;
use crate::util::clock::now_ms;

/// In-memory [`JobStore`] implementation.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl InMemoryJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_fields(task: &mut Task, fields: TaskFields) {
        if let Some(output) = fields.output_data {
            task.output_data = Some(output);
        }
        if let Some(message) = fields.error_message {
            task.error_message = Some(message);
        }
        if let Some(severity) = fields.error_severity {
            task.error_severity = Some(severity);
        }
        if let Some(recoverable) = fields.is_recoverable {
            task.is_recoverable = recoverable;
        }
        if let Some(count) = fields.current_retry_count {
            task.current_retry_count = count;
        }
        if let Some(started) = fields.started_at_ms {
            task.started_at_ms = started;
        }
        if let Some(next_attempt) = fields.next_attempt_at_ms {
            task.next_attempt_at_ms = next_attempt;
        }
        task.updated_at_ms = now_ms();
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: Job) -> Result<(), OrchestratorError> {
        self.jobs.lock().insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Job, OrchestratorError> {
        self.jobs
            .lock()
            .get(job_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    async fn set_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        job.status = status;
        if error_message.is_some() {
            job.error_message = error_message;
        }
        job.updated_at_ms = now_ms();
        Ok(())
    }

    async fn update_job_progress(
        &self,
        job_id: &JobId,
        percent: u8,
    ) -> Result<(), OrchestratorError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        job.progress = percent.min(100);
        job.updated_at_ms = now_ms();
        Ok(())
    }

    async fn increment_recovery_attempts(
        &self,
        job_id: &JobId,
    ) -> Result<u32, OrchestratorError> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        job.recovery_attempts += 1;
        job.updated_at_ms = now_ms();
        Ok(job.recovery_attempts)
    }

    async fn create_tasks(&self, tasks: Vec<Task>) -> Result<(), OrchestratorError> {
        let mut map = self.tasks.lock();
        for task in tasks {
            // Existing ids are kept; graph construction is idempotent.
            map.entry(task.id.clone()).or_insert(task);
        }
        Ok(())
    }

    async fn get_tasks(
        &self,
        job_id: &JobId,
        status_filter: Option<TaskStatus>,
    ) -> Result<Vec<Task>, OrchestratorError> {
        let map = self.tasks.lock();
        let mut tasks: Vec<Task> = map
            .values()
            .filter(|t| &t.job_id == job_id)
            .filter(|t| status_filter.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.execution_priority
                .cmp(&b.execution_priority)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    async fn get_task(&self, task_id: &TaskId) -> Result<Task, OrchestratorError> {
        self.tasks
            .lock()
            .get(task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    async fn compare_and_set_task_status(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        new_status: TaskStatus,
        fields: TaskFields,
    ) -> Result<bool, OrchestratorError> {
        let mut map = self.tasks.lock();
        let task = map
            .get_mut(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
        if task.status != expected {
            return Ok(false);
        }
        task.status = new_status;
        Self::apply_fields(task, fields);
        Ok(true)
    }

    async fn update_task_fields(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        fields: TaskFields,
    ) -> Result<(), OrchestratorError> {
        let mut map = self.tasks.lock();
        let task = map
            .get_mut(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
        task.status = status;
        Self::apply_fields(task, fields);
        Ok(())
    }

    async fn set_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<(), OrchestratorError> {
        let mut map = self.tasks.lock();
        let task = map
            .get_mut(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))?;
        task.status = status;
        task.updated_at_ms = now_ms();
        Ok(())
    }

    async fn delete_tasks(&self, job_id: &JobId) -> Result<usize, OrchestratorError> {
        let mut map = self.tasks.lock();
        let before = map.len();
        map.retain(|_, t| &t.job_id != job_id);
        Ok(before - map.len())
    }
}
