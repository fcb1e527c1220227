//! Content generator seam and pipeline decorators.
//!
//! The engine never constructs prompts or parses model output; it calls an
//! opaque [`ContentGenerator`] and stores whatever structured content comes
//! back. Decorators compose over the trait, so cross-cutting behavior like
//! caching wraps any generator without the scheduler knowing.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::GenerateError;
use crate::core::job::TaskType;

/// The external content-generation service, at its interface boundary.
///
/// Treated as untrusted and slow: implementations must respect `deadline`
/// internally where possible, but the scheduler enforces its own hard
/// timeout around every call regardless.
#[async_trait]
pub trait ContentGenerator: Send + Sync + 'static {
    /// Generate structured content for one task.
    ///
    /// # Errors
    ///
    /// [`GenerateError`] carrying the classified failure.
    async fn generate(
        &self,
        task_type: TaskType,
        payload: &serde_json::Value,
        deadline: Duration,
    ) -> Result<serde_json::Value, GenerateError>;
}

/// Caching decorator over any [`ContentGenerator`].
///
/// Memoizes successful outputs by `(task_type, payload)`, so a regenerated
/// or recovered job does not re-pay for content that already succeeded.
/// The cache is process-local and bounded; the oldest entry is evicted when
/// full. Failures are never cached.
pub struct CachingGenerator<G> {
    inner: G,
    capacity: usize,
    cache: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, serde_json::Value>,
    insertion_order: VecDeque<String>,
}

impl<G> CachingGenerator<G> {
    /// Wrap a generator with a cache holding up to `capacity` outputs.
    #[must_use]
    pub fn new(inner: G, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: Mutex::new(CacheInner::default()),
        }
    }

    /// Number of cached outputs (diagnostics).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The wrapped generator.
    pub const fn inner(&self) -> &G {
        &self.inner
    }

    fn cache_key(task_type: TaskType, payload: &serde_json::Value) -> String {
        format!("{}:{payload}", task_type.as_str())
    }
}

#[async_trait]
impl<G: ContentGenerator> ContentGenerator for CachingGenerator<G> {
    async fn generate(
        &self,
        task_type: TaskType,
        payload: &serde_json::Value,
        deadline: Duration,
    ) -> Result<serde_json::Value, GenerateError> {
        let key = Self::cache_key(task_type, payload);
        if let Some(hit) = self.cache.lock().entries.get(&key).cloned() {
            tracing::debug!(%key, "content cache hit");
            return Ok(hit);
        }

        let output = self.inner.generate(task_type, payload, deadline).await?;

        let mut cache = self.cache.lock();
        if !cache.entries.contains_key(&key) {
            if cache.entries.len() >= self.capacity {
                if let Some(evicted) = cache.insertion_order.pop_front() {
                    cache.entries.remove(&evicted);
                }
            }
            cache.insertion_order.push_back(key.clone());
            cache.entries.insert(key, output.clone());
        }
        Ok(output)
    }
}
