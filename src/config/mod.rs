//! Configuration models for the scheduler, breaker, retry, limits, monitor.

pub mod orchestrator;

pub use orchestrator::OrchestratorConfig;
