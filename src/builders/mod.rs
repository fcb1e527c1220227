//! Builders to construct an orchestrator from configuration.

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::core::error::OrchestratorError;
use crate::core::generator::ContentGenerator;
use crate::core::scheduler::Spawn;
use crate::infra::store::JobStore;
use crate::runtime::Orchestrator;

/// Validate configuration and assemble an [`Orchestrator`] using provided
/// factories for the store and generator.
///
/// # Errors
///
/// [`OrchestratorError::Config`] when the configuration is invalid, or
/// whatever a factory returns.
pub fn build_orchestrator<G, S, Sp, FS, FG>(
    cfg: OrchestratorConfig,
    store_factory: FS,
    generator_factory: FG,
    spawner: Sp,
) -> Result<Orchestrator<G, S, Sp>, OrchestratorError>
where
    G: ContentGenerator,
    S: JobStore,
    Sp: Spawn,
    FS: FnOnce(&OrchestratorConfig) -> Result<Arc<S>, OrchestratorError>,
    FG: FnOnce(&OrchestratorConfig) -> Result<Arc<G>, OrchestratorError>,
{
    cfg.validate()
        .map_err(|e| OrchestratorError::Config(format!("config invalid: {e}")))?;

    let store = store_factory(&cfg)?;
    let generator = generator_factory(&cfg)?;
    Ok(Orchestrator::new(cfg, store, generator, spawner))
}
