//! Job-control API surface: the facade callers interact with.
//!
//! Wires the rate limiter, scheduler, and resilience monitor over one store
//! and one content generator. Job runs execute in the background through the
//! [`Spawn`] seam; every exit path releases the submitter's active-job slot,
//! so quota cannot leak.

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::core::breaker::BreakerRegistry;
use crate::core::error::OrchestratorError;
use crate::core::generator::ContentGenerator;
use crate::core::graph::{build_tasks, CourseOutline};
use crate::core::job::{Job, JobId, JobStatus, Task, TaskFields, TaskId, TaskStatus};
use crate::core::limiter::{DenyReason, RateLimiter, Role};
use crate::core::monitor::{JobHealth, RecommendedAction, RecoveryResult, ResilienceMonitor};
use crate::core::retry::RetryPolicy;
use crate::core::scheduler::{Scheduler, Spawn};
use crate::infra::store::JobStore;
use crate::util::clock::now_ms;

/// The orchestration engine's public facade.
pub struct Orchestrator<G, S, Sp> {
    store: Arc<S>,
    limiter: Arc<RateLimiter>,
    monitor: Arc<ResilienceMonitor<S>>,
    scheduler: Arc<Scheduler<G, S>>,
    spawner: Sp,
    default_max_retries: u32,
    max_recovery_attempts: u32,
}

impl<G, S, Sp> Orchestrator<G, S, Sp>
where
    G: ContentGenerator,
    S: JobStore,
    Sp: Spawn,
{
    /// Assemble an orchestrator from configuration and collaborators.
    ///
    /// Breaker and rate-limiter state is created here and owned by this
    /// instance; it is process-local by design (see the crate docs).
    pub fn new(config: OrchestratorConfig, store: Arc<S>, generator: Arc<G>, spawner: Sp) -> Self {
        let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
        let limiter = Arc::new(RateLimiter::new(config.limits.clone(), now_ms()));
        let monitor = Arc::new(ResilienceMonitor::new(
            Arc::clone(&store),
            config.monitor.clone(),
        ));
        let retry = RetryPolicy::new(config.retry.clone());
        let default_max_retries = retry.default_max_retries();
        let max_recovery_attempts = config.monitor.max_recovery_attempts;
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            generator,
            config.scheduler,
            breakers,
            retry,
            Arc::clone(&monitor),
        ));
        Self {
            store,
            limiter,
            monitor,
            scheduler,
            spawner,
            default_max_retries,
            max_recovery_attempts,
        }
    }

    /// Submit a new generation job for an outline.
    ///
    /// Admits through the rate limiter, persists the job and its task graph,
    /// and starts the scheduler loop in the background. The submitter's
    /// active-job slot is released when the run ends, on every path.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::RateLimited`] on denial, or store failures.
    pub async fn submit_job(
        &self,
        user_id: &str,
        role: Role,
        outline: &CourseOutline,
    ) -> Result<JobId, OrchestratorError> {
        let admission = self.limiter.admit(user_id, role, now_ms());
        if !admission.allowed {
            let reason = admission
                .reason
                .map_or("admission denied", DenyReason::user_message);
            return Err(OrchestratorError::RateLimited {
                reason: reason.to_owned(),
                retry_after_ms: admission.retry_after.map_or(0, |d| d.as_millis()),
            });
        }

        let job = Job::new(user_id, self.max_recovery_attempts);
        let job_id = job.id.clone();
        let tasks = build_tasks(&job_id, outline, self.default_max_retries);
        if tasks.is_empty() {
            self.limiter.release(user_id);
            return Err(OrchestratorError::Config(
                "outline produces no tasks".to_owned(),
            ));
        }

        if let Err(e) = self.persist_submission(job, tasks).await {
            self.limiter.release(user_id);
            return Err(e);
        }
        tracing::info!(job = %job_id, user = user_id, "job submitted");

        self.spawn_run(&job_id, Some(user_id.to_owned()));
        Ok(job_id)
    }

    async fn persist_submission(
        &self,
        job: Job,
        tasks: Vec<Task>,
    ) -> Result<(), OrchestratorError> {
        self.store.create_job(job).await?;
        self.store.create_tasks(tasks).await?;
        Ok(())
    }

    /// Start (or restart) the scheduler loop for a job in the background.
    /// When `release_user` is set, their active-job slot is freed once the
    /// run ends.
    fn spawn_run(&self, job_id: &JobId, release_user: Option<String>) {
        let scheduler = Arc::clone(&self.scheduler);
        let limiter = Arc::clone(&self.limiter);
        let job_id = job_id.clone();
        self.spawner.spawn(async move {
            if let Err(e) = scheduler.run_job(&job_id).await {
                tracing::error!(job = %job_id, error = %e, "job run ended with error");
            }
            if let Some(user) = release_user {
                limiter.release(&user);
            }
        });
    }

    /// Drive a job's scheduler loop to completion on the caller's task.
    ///
    /// Deterministic alternative to the background spawn, used by tests and
    /// embedding callers that manage their own concurrency.
    ///
    /// # Errors
    ///
    /// Same contract as [`Scheduler::run_job`].
    pub async fn run_job(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        self.scheduler.run_job(job_id).await
    }

    /// Classify a job's health.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn get_job_health(&self, job_id: &JobId) -> Result<JobHealth, OrchestratorError> {
        self.monitor.get_job_health(job_id).await
    }

    /// Attempt automatic recovery of an unhealthy job. A successful resume
    /// re-invokes the scheduler in the background.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn attempt_recovery(
        &self,
        job_id: &JobId,
    ) -> Result<RecoveryResult, OrchestratorError> {
        let result = self.monitor.attempt_recovery(job_id).await?;
        if result.recovered && result.action == RecommendedAction::Resume {
            self.spawn_run(job_id, None);
        }
        Ok(result)
    }

    /// Reset a single terminal task back to `pending` so it runs again, and
    /// restart the job's scheduler loop. Returns whether a reset happened.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::TaskNotFound`] when the task does not exist or
    /// does not belong to the job; store failures.
    pub async fn regenerate_task(
        &self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<bool, OrchestratorError> {
        let task = self.store.get_task(task_id).await?;
        if &task.job_id != job_id {
            return Err(OrchestratorError::TaskNotFound(task_id.to_string()));
        }
        if !task.status.is_terminal() {
            return Ok(false);
        }
        let fields = TaskFields {
            current_retry_count: Some(0),
            started_at_ms: Some(None),
            next_attempt_at_ms: Some(None),
            ..TaskFields::default()
        };
        self.store
            .update_task_fields(task_id, TaskStatus::Pending, fields)
            .await?;
        self.store
            .set_job_status(job_id, JobStatus::Queued, None)
            .await?;
        tracing::info!(job = %job_id, task = %task_id, "task reset for regeneration");
        self.spawn_run(job_id, None);
        Ok(true)
    }

    /// Mark a job cancelled. The scheduler notices cooperatively between
    /// batches; in-flight tasks still run to their own deadline.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn cancel_job(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let job = self.store.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.store
            .set_job_status(job_id, JobStatus::Cancelled, None)
            .await
    }

    /// Mark a job paused. The scheduler stops cooperatively; resume with
    /// [`Self::resume_job`].
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn pause_job(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let job = self.store.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Ok(());
        }
        self.store
            .set_job_status(job_id, JobStatus::Paused, None)
            .await
    }

    /// Resume a paused job: re-queue it and restart its scheduler loop.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn resume_job(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let job = self.store.get_job(job_id).await?;
        if job.status != JobStatus::Paused {
            return Ok(());
        }
        self.store
            .set_job_status(job_id, JobStatus::Queued, None)
            .await?;
        self.spawn_run(job_id, None);
        Ok(())
    }

    /// The rate limiter, for diagnostics.
    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
