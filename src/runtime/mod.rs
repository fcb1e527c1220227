//! Runtime adapters and the job-control API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::Orchestrator;
pub use tokio_spawner::TokioSpawner;
