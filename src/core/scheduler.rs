//! Scheduler/executor: dependency resolution, batch dispatch, and the
//! guaranteed status-write path.
//!
//! One logical scheduler loop drives one job. Tasks are claimed through
//! compare-and-set status transitions (the optimistic lock), dispatched
//! concurrently under a single hard deadline each, and their outcomes are
//! recorded through an ordered chain of write fallbacks that must not
//! silently fail.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::core::breaker::{BreakerRegistry, CircuitBreaker, CONTENT_SERVICE, JOB_STORE};
use crate::core::error::{ErrorClass, GenerateError, OrchestratorError};
use crate::core::generator::ContentGenerator;
use crate::core::graph::dependencies_satisfied;
use crate::core::job::{JobId, JobStatus, Task, TaskFields, TaskId, TaskStatus};
use crate::core::monitor::{classify, ResilienceMonitor};
use crate::core::retry::RetryPolicy;
use crate::infra::store::JobStore;
use crate::util::clock::now_ms;

/// Tuning knobs for the scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum tasks fetched and claimed per poll iteration.
    pub batch_size: usize,
    /// Concurrency ceiling for simultaneously running tasks.
    pub max_concurrent_tasks: usize,
    /// Sleep between polls when nothing is ready.
    pub poll_interval_ms: u64,
    /// Hard per-task deadline; always wins over anything the generator does
    /// internally.
    pub task_timeout_ms: u64,
    /// Attempts per strategy in the guaranteed-write chain.
    pub write_attempts: u32,
    /// Consecutive empty polls tolerated before the job is failed as wedged.
    pub max_idle_polls: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent_tasks: 5,
            poll_interval_ms: 2_000,
            task_timeout_ms: 300_000,
            write_attempts: 3,
            max_idle_polls: 150,
        }
    }
}

/// Abstraction for spawning background work on a runtime.
pub trait Spawn: Send + Sync {
    /// Spawn an async task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Drives one job's task graph to completion.
pub struct Scheduler<G, S> {
    store: Arc<S>,
    generator: Arc<G>,
    config: SchedulerConfig,
    breakers: Arc<BreakerRegistry>,
    retry: RetryPolicy,
    monitor: Arc<ResilienceMonitor<S>>,
}

impl<G, S> Scheduler<G, S>
where
    G: ContentGenerator,
    S: JobStore,
{
    /// Assemble a scheduler from its collaborators.
    pub fn new(
        store: Arc<S>,
        generator: Arc<G>,
        config: SchedulerConfig,
        breakers: Arc<BreakerRegistry>,
        retry: RetryPolicy,
        monitor: Arc<ResilienceMonitor<S>>,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            breakers,
            retry,
            monitor,
        }
    }

    /// Run the poll-claim-dispatch loop until every task is terminal, the
    /// job is externally stopped, or a hard failure threshold is hit.
    ///
    /// # Errors
    ///
    /// Store failures that survive the guaranteed-write fallbacks, or a
    /// wedged job that never becomes complete.
    pub async fn run_job(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let job = self.store.get_job(job_id).await?;
        if job.status == JobStatus::Cancelled {
            self.cancel_remaining(job_id).await?;
            return Ok(());
        }
        if job.status.is_terminal() || job.status == JobStatus::Paused {
            return Ok(());
        }
        self.store
            .set_job_status(job_id, JobStatus::Processing, None)
            .await?;
        tracing::info!(job = %job_id, "scheduler loop started");

        let store_breaker = self.breakers.breaker(JOB_STORE);
        let mut idle_polls: u32 = 0;

        loop {
            // Cooperative pause/cancel check between batches.
            let job = self.store.get_job(job_id).await?;
            match job.status {
                JobStatus::Cancelled => {
                    tracing::info!(job = %job_id, "cancelled; stopping cooperatively");
                    self.cancel_remaining(job_id).await?;
                    return Ok(());
                }
                JobStatus::Paused => {
                    tracing::info!(job = %job_id, "paused; stopping cooperatively");
                    return Ok(());
                }
                JobStatus::Failed | JobStatus::Completed => return Ok(()),
                JobStatus::Queued | JobStatus::Processing => {}
            }

            let now = now_ms();
            self.promote_retrying(job_id, now).await?;

            // The poll query runs under the store breaker so a flapping
            // store backs the loop off instead of hammering it.
            if let Err(OrchestratorError::CircuitOpen { retry_after_ms, .. }) =
                store_breaker.acquire(now)
            {
                let wait = self.poll_interval().min(Duration::from_millis(
                    u64::try_from(retry_after_ms).unwrap_or(u64::MAX),
                ));
                tokio::time::sleep(wait).await;
                continue;
            }
            let all_tasks = match self.store.get_tasks(job_id, None).await {
                Ok(tasks) => {
                    store_breaker.record_success();
                    tasks
                }
                Err(e) => {
                    store_breaker.record_failure(ErrorClass::Temporary, now);
                    tracing::warn!(job = %job_id, error = %e, "poll query failed");
                    tokio::time::sleep(self.poll_interval()).await;
                    continue;
                }
            };

            let batch = self.select_ready(&all_tasks, now);
            if batch.is_empty() {
                let health = classify(self.monitor.config(), &job, &all_tasks, now);
                if health.completed {
                    self.finalize(job_id, &all_tasks).await?;
                    return Ok(());
                }
                if health.can_auto_recover {
                    let result = self.monitor.attempt_recovery(job_id).await?;
                    tracing::info!(job = %job_id, message = %result.message, "mid-run recovery");
                    if result.recovered {
                        idle_polls = 0;
                        continue;
                    }
                }
                idle_polls += 1;
                if idle_polls > self.config.max_idle_polls {
                    let reason = "no runnable tasks and job never completed".to_owned();
                    self.fail_job(job_id, &reason).await;
                    return Err(OrchestratorError::JobFailed {
                        job_id: job_id.to_string(),
                        reason,
                    });
                }
                tokio::time::sleep(self.poll_interval()).await;
                continue;
            }
            idle_polls = 0;

            let claimed = self.claim_batch(batch, now).await?;
            if claimed.is_empty() {
                // Lost every race; the winners will finish the work.
                tokio::time::sleep(self.poll_interval()).await;
                continue;
            }
            if let Err(e) = self.dispatch_batch(claimed).await {
                // Only the guaranteed-write path errors here, and only after
                // every fallback was exhausted; the job cannot be trusted.
                self.fail_job(job_id, &e.to_string()).await;
                return Err(e);
            }
            self.update_progress(job_id).await?;
        }
    }

    const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    /// Ready tasks for this poll: schedulable, dependency-satisfied, breaker
    /// willing, bounded by batch size and the concurrency ceiling. Input is
    /// already priority-ordered by the store.
    fn select_ready(&self, all_tasks: &[Task], now: u128) -> Vec<Task> {
        let statuses: HashMap<TaskId, TaskStatus> = all_tasks
            .iter()
            .map(|t| (t.id.clone(), t.status))
            .collect();
        let limit = self.config.batch_size.min(self.config.max_concurrent_tasks);
        let content_breaker = self.breakers.breaker(CONTENT_SERVICE);

        let mut batch = Vec::with_capacity(limit);
        for task in all_tasks
            .iter()
            .filter(|t| t.is_schedulable())
            .filter(|t| dependencies_satisfied(t, &statuses))
        {
            if batch.len() >= limit {
                break;
            }
            // Breaker admission happens before claiming, so a short-circuited
            // task simply stays pending; deferred, never failed.
            if content_breaker.acquire(now).is_err() {
                tracing::debug!(task = %task.id, "content breaker rejected; deferring");
                break;
            }
            batch.push(task.clone());
        }
        batch
    }

    /// Atomically claim a batch; tasks that lose their CAS race are dropped.
    async fn claim_batch(
        &self,
        batch: Vec<Task>,
        now: u128,
    ) -> Result<Vec<Task>, OrchestratorError> {
        let mut claimed = Vec::with_capacity(batch.len());
        for mut task in batch {
            let won = self
                .store
                .compare_and_set_task_status(
                    &task.id,
                    task.status,
                    TaskStatus::Running,
                    TaskFields::started(now),
                )
                .await?;
            if won {
                task.status = TaskStatus::Running;
                task.started_at_ms = Some(now);
                claimed.push(task);
            } else {
                tracing::debug!(task = %task.id, "lost claim race; left for next poll");
                self.breakers.breaker(CONTENT_SERVICE).release_unused();
            }
        }
        Ok(claimed)
    }

    /// Dispatch every claimed task concurrently, each under one hard
    /// deadline, and record all outcomes.
    async fn dispatch_batch(&self, claimed: Vec<Task>) -> Result<(), OrchestratorError> {
        let deadline = Duration::from_millis(self.config.task_timeout_ms);
        let content_breaker = self.breakers.breaker(CONTENT_SERVICE);
        let mut join_set = JoinSet::new();

        for task in claimed {
            let generator = Arc::clone(&self.generator);
            join_set.spawn(async move {
                tracing::debug!(task = %task.id, kind = ?task.task_type, "executing");
                let result = tokio::time::timeout(
                    deadline,
                    generator.generate(task.task_type, &task.input_data, deadline),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(GenerateError::timeout("task deadline exceeded"))
                });
                (task, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((task, result)) => {
                    self.record_outcome(&content_breaker, &task, result).await?;
                }
                Err(e) => {
                    // A panicked task stays `running`; the resilience monitor
                    // will reset it once it goes stale.
                    tracing::error!(error = %e, "task execution panicked");
                }
            }
        }
        Ok(())
    }

    /// Record one task outcome through the guaranteed-write path.
    async fn record_outcome(
        &self,
        breaker: &CircuitBreaker,
        task: &Task,
        result: Result<serde_json::Value, GenerateError>,
    ) -> Result<(), OrchestratorError> {
        let now = now_ms();
        match result {
            Ok(output) => {
                breaker.record_success();
                tracing::info!(task = %task.id, "completed");
                self.guaranteed_task_write(
                    &task.id,
                    TaskStatus::Running,
                    TaskStatus::Completed,
                    TaskFields::completed(output),
                )
                .await
            }
            Err(err) => {
                breaker.record_failure(err.class, now);
                let severity = err.class.severity();
                if self.retry.should_retry(task, err.class, breaker) {
                    let delay = self.retry.calculate_delay(task.current_retry_count);
                    tracing::warn!(
                        task = %task.id,
                        class = ?err.class,
                        retry = task.current_retry_count + 1,
                        delay_ms = delay.as_millis(),
                        "failed, will retry"
                    );
                    let fields = TaskFields {
                        error_message: Some(err.message),
                        error_severity: Some(severity),
                        is_recoverable: Some(true),
                        current_retry_count: Some(task.current_retry_count + 1),
                        started_at_ms: Some(None),
                        next_attempt_at_ms: Some(Some(now + delay.as_millis())),
                        ..TaskFields::default()
                    };
                    self.guaranteed_task_write(
                        &task.id,
                        TaskStatus::Running,
                        TaskStatus::Retrying,
                        fields,
                    )
                    .await
                } else {
                    tracing::warn!(task = %task.id, class = ?err.class, "failed terminally");
                    self.guaranteed_task_write(
                        &task.id,
                        TaskStatus::Running,
                        TaskStatus::Failed,
                        TaskFields::failed(err.message, severity, err.class.is_retryable()),
                    )
                    .await
                }
            }
        }
    }

    /// The bulletproof status write: CAS first, then an unconditional field
    /// update, then a minimal status-only update, each retried a bounded
    /// number of times. A task must never stay `running` because the write
    /// path failed; exhaustion is a critical alert and fails the caller.
    async fn guaranteed_task_write(
        &self,
        task_id: &TaskId,
        expected: TaskStatus,
        new_status: TaskStatus,
        fields: TaskFields,
    ) -> Result<(), OrchestratorError> {
        let pause = Duration::from_millis(100);

        for attempt in 0..self.config.write_attempts {
            match self
                .store
                .compare_and_set_task_status(task_id, expected, new_status, fields.clone())
                .await
            {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    // The row moved under us (recovery reset it, or another
                    // writer won). Stomping it now would corrupt that state.
                    tracing::warn!(task = %task_id, "status changed concurrently; skipping write");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(task = %task_id, attempt, error = %e, "primary write failed");
                }
            }
            tokio::time::sleep(pause).await;
        }

        for attempt in 0..self.config.write_attempts {
            match self
                .store
                .update_task_fields(task_id, new_status, fields.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(task = %task_id, attempt, error = %e, "field-update fallback failed");
                }
            }
            tokio::time::sleep(pause).await;
        }

        for attempt in 0..self.config.write_attempts {
            match self.store.set_task_status(task_id, new_status).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(task = %task_id, attempt, error = %e, "status-only fallback failed");
                }
            }
            tokio::time::sleep(pause).await;
        }

        tracing::error!(
            task = %task_id,
            alert = "critical",
            "status write exhausted all fallbacks"
        );
        Err(OrchestratorError::WriteExhausted(task_id.to_string()))
    }

    /// Promote `retrying` tasks whose backoff has elapsed back to `queued`.
    async fn promote_retrying(&self, job_id: &JobId, now: u128) -> Result<(), OrchestratorError> {
        let retrying = self
            .store
            .get_tasks(job_id, Some(TaskStatus::Retrying))
            .await?;
        for task in retrying {
            if task.next_attempt_at_ms.is_none_or(|t| t <= now) {
                let fields = TaskFields {
                    next_attempt_at_ms: Some(None),
                    ..TaskFields::default()
                };
                let _ = self
                    .store
                    .compare_and_set_task_status(
                        &task.id,
                        TaskStatus::Retrying,
                        TaskStatus::Queued,
                        fields,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Cancel every not-yet-started task of a cancelled job, including
    /// tasks parked in `retrying`, so no task outlives its job non-terminal.
    async fn cancel_remaining(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let tasks = self.store.get_tasks(job_id, None).await?;
        for task in tasks
            .iter()
            .filter(|t| t.is_schedulable() || t.status == TaskStatus::Retrying)
        {
            let _ = self
                .store
                .compare_and_set_task_status(
                    &task.id,
                    task.status,
                    TaskStatus::Cancelled,
                    TaskFields::default(),
                )
                .await?;
        }
        Ok(())
    }

    /// Write final progress and mark the job completed.
    ///
    /// A job with some failed leaf tasks still completes; the failures stay
    /// recorded on the tasks themselves.
    async fn finalize(&self, job_id: &JobId, all_tasks: &[Task]) -> Result<(), OrchestratorError> {
        let percent = progress_percent(all_tasks);
        self.store.update_job_progress(job_id, percent).await?;
        self.store
            .set_job_status(job_id, JobStatus::Completed, None)
            .await?;
        tracing::info!(job = %job_id, progress = percent, "job completed");
        Ok(())
    }

    /// Recompute aggregate progress after a batch.
    async fn update_progress(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let tasks = self.store.get_tasks(job_id, None).await?;
        self.store
            .update_job_progress(job_id, progress_percent(&tasks))
            .await
    }

    /// Terminal job failure: mark the job and every non-terminal task failed.
    /// Best-effort; the store may be the thing that is broken.
    async fn fail_job(&self, job_id: &JobId, reason: &str) {
        tracing::error!(job = %job_id, reason, "failing job");
        if let Err(e) = self
            .store
            .set_job_status(job_id, JobStatus::Failed, Some(reason.to_owned()))
            .await
        {
            tracing::error!(job = %job_id, error = %e, "could not persist job failure");
        }
        if let Ok(tasks) = self.store.get_tasks(job_id, None).await {
            for task in tasks.iter().filter(|t| !t.status.is_terminal()) {
                let fields = TaskFields {
                    error_message: Some(format!("job failed: {reason}")),
                    ..TaskFields::default()
                };
                if let Err(e) = self
                    .store
                    .update_task_fields(&task.id, TaskStatus::Failed, fields)
                    .await
                {
                    tracing::error!(task = %task.id, error = %e, "could not fail task");
                }
            }
        }
    }
}

/// Aggregate progress: completed tasks over total, as a 0-100 percentage.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn progress_percent(tasks: &[Task]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let completed = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    ((completed * 100) / tasks.len()) as u8
}
