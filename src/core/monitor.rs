//! Resilience monitor: job health classification and recovery.
//!
//! Classification is a pure function over a job, its tasks, and the clock,
//! so every threshold is unit-testable without a store. Recovery goes
//! through the store and is idempotent: recovering a healthy job is a no-op.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::OrchestratorError;
use crate::core::job::{Job, JobId, JobStatus, Task, TaskFields, TaskStatus};
use crate::infra::store::JobStore;
use crate::util::clock::now_ms;

/// Thresholds for health classification and the recovery ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Idle time after which a job counts as stalled.
    pub stalled_after_ms: u64,
    /// Idle time after which a job counts as stuck.
    pub stuck_after_ms: u64,
    /// Idle time after which a job counts as abandoned.
    pub abandoned_after_ms: u64,
    /// How long a single task may sit in `running` before it is stale.
    pub task_timeout_ms: u64,
    /// Automatic recovery attempts allowed before requiring an operator.
    pub max_recovery_attempts: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stalled_after_ms: 300_000,
            stuck_after_ms: 600_000,
            abandoned_after_ms: 1_800_000,
            task_timeout_ms: 300_000,
            max_recovery_attempts: 3,
        }
    }
}

/// Health classification of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Progressing normally (or finished).
    Healthy,
    /// Deliberately paused by the caller; idle time does not apply.
    Paused,
    /// No activity for a short while; probably still fine.
    Stalled,
    /// No activity for a long while, or a task wedged in `running`.
    Stuck,
    /// No activity for so long the driving process is presumed gone.
    Abandoned,
    /// The job terminated as failed.
    Failed,
}

/// What the caller should do about a job's current health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Nothing to do; let it run.
    Wait,
    /// Reset stale running tasks and re-invoke the scheduler.
    Resume,
    /// Fail the job, drop its tasks, submit fresh.
    Restart,
    /// Recovery budget exhausted; an operator must look.
    ManualIntervention,
    /// The job failed terminally; delete and resubmit.
    DeleteAndRetry,
}

/// Health report for a job, safe to surface to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHealth {
    /// Subject job.
    pub job_id: JobId,
    /// Classification.
    pub state: HealthState,
    /// Whether every task has reached a terminal status.
    pub completed: bool,
    /// Suggested next step.
    pub recommended_action: RecommendedAction,
    /// Whether [`ResilienceMonitor::attempt_recovery`] would act.
    pub can_auto_recover: bool,
    /// Actionable message for end users; never a raw internal error.
    pub user_message: String,
    /// Recoveries already attempted.
    pub recovery_attempts: u32,
    /// Recovery ceiling.
    pub max_recovery_attempts: u32,
}

/// Outcome of a recovery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    /// Subject job.
    pub job_id: JobId,
    /// Action that was taken.
    pub action: RecommendedAction,
    /// Whether the job is expected to make progress again.
    pub recovered: bool,
    /// Human-readable summary.
    pub message: String,
}

/// Classify a job's health from its tasks and last-activity timestamp.
///
/// Pure; all store access happens in the caller.
#[must_use]
pub fn classify(config: &MonitorConfig, job: &Job, tasks: &[Task], now_ms: u128) -> JobHealth {
    let total = tasks.len();
    let terminal = tasks.iter().filter(|t| t.status.is_terminal()).count();
    let completed = total > 0 && terminal == total;

    let mut state = if job.status == JobStatus::Failed {
        HealthState::Failed
    } else if completed || job.status.is_terminal() {
        HealthState::Healthy
    } else if job.status == JobStatus::Paused {
        // A paused job is idle on purpose; never escalate it.
        HealthState::Paused
    } else {
        let last_activity = tasks
            .iter()
            .map(|t| t.updated_at_ms)
            .chain(std::iter::once(job.updated_at_ms))
            .max()
            .unwrap_or(job.updated_at_ms);
        let idle = now_ms.saturating_sub(last_activity);
        if idle >= u128::from(config.abandoned_after_ms) {
            HealthState::Abandoned
        } else if idle >= u128::from(config.stuck_after_ms) {
            HealthState::Stuck
        } else if idle >= u128::from(config.stalled_after_ms) {
            HealthState::Stalled
        } else {
            HealthState::Healthy
        }
    };

    // A task wedged past its own timeout makes the job at least stuck, even
    // if other tasks kept the activity timestamp fresh.
    if matches!(state, HealthState::Healthy | HealthState::Stalled)
        && !completed
        && !job.status.is_terminal()
    {
        let wedged = tasks.iter().any(|t| {
            t.status == TaskStatus::Running
                && t.started_at_ms
                    .is_some_and(|s| now_ms.saturating_sub(s) >= u128::from(config.task_timeout_ms))
        });
        if wedged {
            state = HealthState::Stuck;
        }
    }

    let attempts_left = job.recovery_attempts < job.max_recovery_attempts;
    let (recommended_action, can_auto_recover) = match state {
        HealthState::Healthy | HealthState::Paused => (RecommendedAction::Wait, false),
        HealthState::Stalled | HealthState::Stuck => {
            if attempts_left {
                (RecommendedAction::Resume, true)
            } else {
                (RecommendedAction::ManualIntervention, false)
            }
        }
        HealthState::Abandoned => {
            if attempts_left {
                (RecommendedAction::Restart, true)
            } else {
                (RecommendedAction::ManualIntervention, false)
            }
        }
        HealthState::Failed => (RecommendedAction::DeleteAndRetry, false),
    };

    let user_message = match state {
        HealthState::Healthy if completed => "Generation finished.",
        HealthState::Healthy => "Generation is in progress.",
        HealthState::Paused => "Generation is paused. Resume it to continue.",
        HealthState::Stalled => "Generation is taking longer than usual; it should resume shortly.",
        HealthState::Stuck if can_auto_recover => {
            "Generation appears stuck; it will be resumed automatically."
        }
        HealthState::Abandoned if can_auto_recover => {
            "Generation was interrupted; it will be restarted."
        }
        HealthState::Stuck | HealthState::Abandoned => {
            "Generation could not be recovered automatically. Support has been notified."
        }
        HealthState::Failed => "Generation failed. Delete this job and submit it again.",
    }
    .to_owned();

    JobHealth {
        job_id: job.id.clone(),
        state,
        completed,
        recommended_action,
        can_auto_recover,
        user_message,
        recovery_attempts: job.recovery_attempts,
        max_recovery_attempts: job.max_recovery_attempts,
    }
}

/// Detects unhealthy jobs and drives recovery actions through the store.
pub struct ResilienceMonitor<S> {
    store: Arc<S>,
    config: MonitorConfig,
}

impl<S: JobStore> ResilienceMonitor<S> {
    /// Create a monitor over a store.
    pub const fn new(store: Arc<S>, config: MonitorConfig) -> Self {
        Self { store, config }
    }

    /// Monitor configuration.
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Classify a job's current health.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn get_job_health(&self, job_id: &JobId) -> Result<JobHealth, OrchestratorError> {
        let job = self.store.get_job(job_id).await?;
        let tasks = self.store.get_tasks(job_id, None).await?;
        Ok(classify(&self.config, &job, &tasks, now_ms()))
    }

    /// Attempt to recover an unhealthy job.
    ///
    /// Idempotent: a healthy, finished, or paused job is left untouched. When action
    /// is taken, the attempt counter is incremented *before* any repair work
    /// so that a crash mid-recovery still counts against the ceiling.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::JobNotFound`] or store failures.
    pub async fn attempt_recovery(
        &self,
        job_id: &JobId,
    ) -> Result<RecoveryResult, OrchestratorError> {
        let health = self.get_job_health(job_id).await?;

        if health.state == HealthState::Healthy || health.completed {
            return Ok(RecoveryResult {
                job_id: job_id.clone(),
                action: RecommendedAction::Wait,
                recovered: true,
                message: "job is healthy; nothing to recover".to_owned(),
            });
        }
        if health.state == HealthState::Paused {
            return Ok(RecoveryResult {
                job_id: job_id.clone(),
                action: RecommendedAction::Wait,
                recovered: false,
                message: "job is paused; resume it to continue".to_owned(),
            });
        }
        if !health.can_auto_recover {
            tracing::warn!(job = %job_id, state = ?health.state, "recovery ceiling reached");
            return Ok(RecoveryResult {
                job_id: job_id.clone(),
                action: RecommendedAction::ManualIntervention,
                recovered: false,
                message: "automatic recovery budget exhausted".to_owned(),
            });
        }

        // Counted first; a crash after this point still burns the attempt.
        let attempts = self.store.increment_recovery_attempts(job_id).await?;
        tracing::info!(job = %job_id, attempts, action = ?health.recommended_action, "recovering");

        match health.recommended_action {
            RecommendedAction::Resume => {
                let reset = self.reset_stale_running(job_id).await?;
                self.store
                    .set_job_status(job_id, JobStatus::Queued, None)
                    .await?;
                Ok(RecoveryResult {
                    job_id: job_id.clone(),
                    action: RecommendedAction::Resume,
                    recovered: true,
                    message: format!("reset {reset} stale running task(s); job re-queued"),
                })
            }
            RecommendedAction::Restart => {
                let dropped = self.store.delete_tasks(job_id).await?;
                self.store
                    .set_job_status(
                        job_id,
                        JobStatus::Failed,
                        Some("abandoned; restarted via recovery".to_owned()),
                    )
                    .await?;
                Ok(RecoveryResult {
                    job_id: job_id.clone(),
                    action: RecommendedAction::Restart,
                    recovered: false,
                    message: format!("dropped {dropped} task(s); submit a fresh job"),
                })
            }
            RecommendedAction::Wait
            | RecommendedAction::ManualIntervention
            | RecommendedAction::DeleteAndRetry => Ok(RecoveryResult {
                job_id: job_id.clone(),
                action: health.recommended_action,
                recovered: false,
                message: "no automatic action for this state".to_owned(),
            }),
        }
    }

    /// CAS every stale `running` task back to `pending`, clearing its start
    /// timestamp and backoff gate. Returns how many were reset.
    async fn reset_stale_running(&self, job_id: &JobId) -> Result<usize, OrchestratorError> {
        let running = self
            .store
            .get_tasks(job_id, Some(TaskStatus::Running))
            .await?;
        let mut reset = 0;
        for task in running {
            let fields = TaskFields {
                started_at_ms: Some(None),
                next_attempt_at_ms: Some(None),
                ..TaskFields::default()
            };
            if self
                .store
                .compare_and_set_task_status(
                    &task.id,
                    TaskStatus::Running,
                    TaskStatus::Pending,
                    fields,
                )
                .await?
            {
                reset += 1;
            }
        }
        Ok(reset)
    }
}
