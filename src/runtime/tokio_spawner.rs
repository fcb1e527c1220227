//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use crate::core::scheduler::Spawn;

/// Tokio-based spawner that runs job loops on a tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
    // Present only when this spawner owns its runtime; keeps it alive for as
    // long as any clone of the spawner exists.
    _owned_runtime: Option<Arc<tokio::runtime::Runtime>>,
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
            _owned_runtime: None,
        }
    }

    /// Create a spawner backed by a new multi-threaded runtime it owns.
    ///
    /// # Errors
    ///
    /// Runtime construction failure.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            handle: Arc::new(handle),
            _owned_runtime: Some(Arc::new(runtime)),
        })
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // `_owned_runtime` (when present) lives as long as this spawner, so
        // the handle is always backed by a live runtime here.
        self.handle.spawn(fut);
    }
}
