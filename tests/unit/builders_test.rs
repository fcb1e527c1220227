//! Tests for orchestrator construction from configuration

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coursegen::builders::build_orchestrator;
use coursegen::config::OrchestratorConfig;
use coursegen::core::{ContentGenerator, GenerateError, OrchestratorError, Spawn, TaskType};
use coursegen::infra::InMemoryJobStore;

struct EchoGenerator;

#[async_trait]
impl ContentGenerator for EchoGenerator {
    async fn generate(
        &self,
        _task_type: TaskType,
        payload: &serde_json::Value,
        _deadline: Duration,
    ) -> Result<serde_json::Value, GenerateError> {
        Ok(payload.clone())
    }
}

/// Drops every future; construction tests never run jobs.
struct NoopSpawner;

impl Spawn for NoopSpawner {
    fn spawn<F>(&self, _fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
    }
}

#[test]
fn test_build_with_default_config() {
    let result = build_orchestrator(
        OrchestratorConfig::default(),
        |_| Ok(Arc::new(InMemoryJobStore::new())),
        |_| Ok(Arc::new(EchoGenerator)),
        NoopSpawner,
    );
    assert!(result.is_ok());
}

#[test]
fn test_build_rejects_invalid_config() {
    let mut cfg = OrchestratorConfig::default();
    cfg.scheduler.batch_size = 0;
    let result = build_orchestrator(
        cfg,
        |_| Ok(Arc::new(InMemoryJobStore::new())),
        |_| Ok(Arc::new(EchoGenerator)),
        NoopSpawner,
    );
    match result {
        Err(OrchestratorError::Config(msg)) => assert!(msg.contains("batch_size")),
        _ => panic!("expected Config error"),
    }
}

#[test]
fn test_build_propagates_factory_errors() {
    let result = build_orchestrator(
        OrchestratorConfig::default(),
        |_| Err::<Arc<InMemoryJobStore>, _>(OrchestratorError::Store("unreachable host".into())),
        |_| Ok(Arc::new(EchoGenerator)),
        NoopSpawner,
    );
    assert!(matches!(result, Err(OrchestratorError::Store(_))));
}
