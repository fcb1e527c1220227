//! Tests for resilience monitor health classification and recovery

use std::sync::Arc;

use coursegen::core::{
    classify, HealthState, Job, JobStatus, MonitorConfig, RecommendedAction,
    ResilienceMonitor, Task, TaskId, TaskStatus, TaskType,
};
use coursegen::infra::{InMemoryJobStore, JobStore};

fn test_config() -> MonitorConfig {
    MonitorConfig {
        stalled_after_ms: 300_000,
        stuck_after_ms: 600_000,
        abandoned_after_ms: 1_800_000,
        task_timeout_ms: 300_000,
        max_recovery_attempts: 3,
    }
}

fn job_at(updated_at_ms: u128) -> Job {
    let mut job = Job::new("user-1", 3);
    job.status = JobStatus::Processing;
    job.updated_at_ms = updated_at_ms;
    job.created_at_ms = updated_at_ms;
    job
}

fn task_at(job: &Job, status: TaskStatus, updated_at_ms: u128) -> Task {
    let mut task = Task::new(
        TaskId::from("section-l1-0"),
        job.id.clone(),
        TaskType::Section,
        vec![],
        serde_json::json!({}),
        3,
    );
    task.status = status;
    task.updated_at_ms = updated_at_ms;
    task
}

#[test]
fn test_active_job_is_healthy() {
    let cfg = test_config();
    let job = job_at(1_000_000);
    let tasks = vec![task_at(&job, TaskStatus::Running, 1_000_000)];
    let health = classify(&cfg, &job, &tasks, 1_060_000);
    assert_eq!(health.state, HealthState::Healthy);
    assert_eq!(health.recommended_action, RecommendedAction::Wait);
    assert!(!health.can_auto_recover);
}

#[test]
fn test_idle_thresholds() {
    let cfg = test_config();
    let job = job_at(0);
    let tasks = vec![task_at(&job, TaskStatus::Queued, 0)];

    let stalled = classify(&cfg, &job, &tasks, 300_000);
    assert_eq!(stalled.state, HealthState::Stalled);
    assert_eq!(stalled.recommended_action, RecommendedAction::Resume);

    let stuck = classify(&cfg, &job, &tasks, 600_000);
    assert_eq!(stuck.state, HealthState::Stuck);
    assert_eq!(stuck.recommended_action, RecommendedAction::Resume);

    let abandoned = classify(&cfg, &job, &tasks, 1_800_000);
    assert_eq!(abandoned.state, HealthState::Abandoned);
    assert_eq!(abandoned.recommended_action, RecommendedAction::Restart);
}

#[test]
fn test_last_activity_uses_freshest_task() {
    let cfg = test_config();
    let job = job_at(0);
    // One stale task, one recently touched. The job is not idle.
    let tasks = vec![
        task_at(&job, TaskStatus::Queued, 0),
        task_at(&job, TaskStatus::Completed, 590_000),
    ];
    let health = classify(&cfg, &job, &tasks, 600_000);
    assert_eq!(health.state, HealthState::Healthy);
}

#[test]
fn test_wedged_running_task_makes_job_stuck() {
    let cfg = test_config();
    let job = job_at(0);
    let mut wedged = task_at(&job, TaskStatus::Running, 100_000);
    wedged.started_at_ms = Some(0);
    // Fresh activity elsewhere keeps the idle clock low.
    let fresh = task_at(&job, TaskStatus::Completed, 290_000);
    let health = classify(&cfg, &job, &[wedged, fresh], 300_001);
    assert_eq!(health.state, HealthState::Stuck);
}

#[test]
fn test_all_terminal_tasks_means_completed() {
    let cfg = test_config();
    let job = job_at(0);
    let tasks = vec![
        task_at(&job, TaskStatus::Completed, 0),
        task_at(&job, TaskStatus::Failed, 0),
        task_at(&job, TaskStatus::Skipped, 0),
    ];
    // Long idle, but every task is terminal.
    let health = classify(&cfg, &job, &tasks, 10_000_000);
    assert!(health.completed);
    assert_eq!(health.state, HealthState::Healthy);
}

#[test]
fn test_empty_task_set_is_not_completed() {
    let cfg = test_config();
    let job = job_at(0);
    let health = classify(&cfg, &job, &[], 0);
    assert!(!health.completed);
}

#[test]
fn test_failed_job_recommends_delete_and_retry() {
    let cfg = test_config();
    let mut job = job_at(0);
    job.status = JobStatus::Failed;
    let health = classify(&cfg, &job, &[], 0);
    assert_eq!(health.state, HealthState::Failed);
    assert_eq!(health.recommended_action, RecommendedAction::DeleteAndRetry);
    assert!(!health.can_auto_recover);
}

#[test]
fn test_recovery_ceiling_forces_manual_intervention() {
    let cfg = test_config();
    let mut job = job_at(0);
    job.recovery_attempts = 3;
    let tasks = vec![task_at(&job, TaskStatus::Queued, 0)];
    let health = classify(&cfg, &job, &tasks, 700_000);
    assert_eq!(health.state, HealthState::Stuck);
    assert_eq!(
        health.recommended_action,
        RecommendedAction::ManualIntervention
    );
    assert!(!health.can_auto_recover);
}

#[tokio::test]
async fn test_recovery_is_noop_for_healthy_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let job = Job::new("user-1", 3);
    let job_id = job.id.clone();
    store.create_job(job).await.unwrap();

    let monitor = ResilienceMonitor::new(Arc::clone(&store), test_config());
    let result = monitor.attempt_recovery(&job_id).await.unwrap();
    assert!(result.recovered);
    assert_eq!(result.action, RecommendedAction::Wait);
    assert_eq!(store.get_job(&job_id).await.unwrap().recovery_attempts, 0);
}

/// A task that went `running` long before `now` and never came back. Keeps
/// `updated_at_ms` fresh so only the wedged-task rule can fire.
fn wedged_task(job: &Job, id: &str, now: u128) -> Task {
    let mut task = Task::new(
        TaskId::from(id),
        job.id.clone(),
        TaskType::Section,
        vec![],
        serde_json::json!({}),
        3,
    );
    task.status = TaskStatus::Running;
    task.started_at_ms = Some(now.saturating_sub(400_000));
    task
}

fn wall_now_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis()
}

#[tokio::test]
async fn test_resume_resets_stale_running_tasks_and_requeues() {
    let store = Arc::new(InMemoryJobStore::new());
    let mut job = Job::new("user-1", 3);
    job.status = JobStatus::Processing;
    let job_id = job.id.clone();
    store.create_job(job.clone()).await.unwrap();

    let task = wedged_task(&job, "section-l1-0", wall_now_ms());
    let task_id = task.id.clone();
    store.create_tasks(vec![task]).await.unwrap();

    let monitor = ResilienceMonitor::new(Arc::clone(&store), test_config());
    let result = monitor.attempt_recovery(&job_id).await.unwrap();
    assert!(result.recovered);
    assert_eq!(result.action, RecommendedAction::Resume);

    let recovered_job = store.get_job(&job_id).await.unwrap();
    assert_eq!(recovered_job.status, JobStatus::Queued);
    assert_eq!(recovered_job.recovery_attempts, 1);

    let reset = store.get_task(&task_id).await.unwrap();
    assert_eq!(reset.status, TaskStatus::Pending);
    assert_eq!(reset.started_at_ms, None);
}

#[tokio::test]
async fn test_recovery_burns_attempts_until_ceiling() {
    let store = Arc::new(InMemoryJobStore::new());
    let mut job = Job::new("user-1", 2);
    job.status = JobStatus::Processing;
    let job_id = job.id.clone();
    store.create_job(job.clone()).await.unwrap();

    let monitor = ResilienceMonitor::new(Arc::clone(&store), test_config());
    for i in 0..2 {
        // A fresh wedged task re-triggers the stuck classification.
        let id = format!("section-l{i}-0");
        store
            .create_tasks(vec![wedged_task(&job, &id, wall_now_ms())])
            .await
            .unwrap();
        let result = monitor.attempt_recovery(&job_id).await.unwrap();
        assert!(result.recovered);
        assert_eq!(result.action, RecommendedAction::Resume);
    }

    // Still wedged, but the attempt budget is spent.
    store
        .create_tasks(vec![wedged_task(&job, "section-l9-0", wall_now_ms())])
        .await
        .unwrap();
    let third = monitor.attempt_recovery(&job_id).await.unwrap();
    assert!(!third.recovered);
    assert_eq!(third.action, RecommendedAction::ManualIntervention);
    assert_eq!(store.get_job(&job_id).await.unwrap().recovery_attempts, 2);
}

#[test]
fn test_paused_job_never_escalates_by_idle_time() {
    let cfg = test_config();
    let mut job = job_at(0);
    job.status = JobStatus::Paused;
    let tasks = vec![task_at(&job, TaskStatus::Pending, 0)];

    // Idle far past every threshold.
    let health = classify(&cfg, &job, &tasks, 2_000_000);
    assert_eq!(health.state, HealthState::Paused);
    assert_eq!(health.recommended_action, RecommendedAction::Wait);
    assert!(!health.can_auto_recover);
    assert!(health.user_message.contains("paused"));
}

#[tokio::test]
async fn test_recovery_leaves_paused_job_paused() {
    let store = Arc::new(InMemoryJobStore::new());
    let mut job = Job::new("user-1", 3);
    job.status = JobStatus::Paused;
    job.updated_at_ms = 0;
    let job_id = job.id.clone();
    store.create_job(job.clone()).await.unwrap();
    store
        .create_tasks(vec![task_at(&job, TaskStatus::Pending, 0)])
        .await
        .unwrap();

    let monitor = ResilienceMonitor::new(Arc::clone(&store), test_config());
    let result = monitor.attempt_recovery(&job_id).await.unwrap();
    assert!(!result.recovered);
    assert_eq!(result.action, RecommendedAction::Wait);

    let untouched = store.get_job(&job_id).await.unwrap();
    assert_eq!(untouched.status, JobStatus::Paused);
    assert_eq!(untouched.recovery_attempts, 0);
}
