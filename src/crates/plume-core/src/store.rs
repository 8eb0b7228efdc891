//! In-memory execution store.
//!
//! Backs tests and single-process deployments. Cached entries live in a
//! sharded concurrent map: readers never block each other, writes append,
//! and the hit-count increment happens under the entry's shard lock, so
//! concurrent hits cannot lose updates.

use crate::error::{EngineError, Result};
use crate::models::cache::CachedExecution;
use crate::models::generation::GenerationResult;
use crate::models::routing::BackendDescriptor;
use crate::traits::{Clock, ExecutionStore, SystemClock};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// In-memory [`ExecutionStore`] implementation.
pub struct MemoryStore {
    backends: RwLock<Vec<BackendDescriptor>>,
    cached: DashMap<String, CachedExecution>,
    results: DashMap<String, Vec<GenerationResult>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store with an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            backends: RwLock::new(Vec::new()),
            cached: DashMap::new(),
            results: DashMap::new(),
            clock,
        }
    }

    /// Replace the backend registry.
    pub fn set_backends(&self, backends: Vec<BackendDescriptor>) {
        *self.backends.write() = backends;
    }

    /// Persisted results for a task kind.
    pub fn results_for_kind(&self, task_kind: &str) -> Vec<GenerationResult> {
        self.results
            .get(task_kind)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Number of cached executions across all task kinds.
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn active_backends(&self) -> Result<Vec<BackendDescriptor>> {
        Ok(self
            .backends
            .read()
            .iter()
            .filter(|b| b.is_active)
            .cloned()
            .collect())
    }

    async fn cached_for_kind(&self, task_kind: &str) -> Result<Vec<CachedExecution>> {
        Ok(self
            .cached
            .iter()
            .filter(|e| e.value().task_kind == task_kind)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn append_cached(&self, entry: CachedExecution) -> Result<()> {
        self.cached.insert(entry.execution_id.clone(), entry);
        Ok(())
    }

    async fn record_cache_hit(&self, execution_id: &str) -> Result<()> {
        match self.cached.get_mut(execution_id) {
            Some(mut entry) => {
                // Shard write lock is held for the whole closure; the
                // increment cannot race another hit.
                entry.hit_count += 1;
                entry.last_used_at = self.clock.now();
                Ok(())
            }
            None => Err(EngineError::Store(format!(
                "cached execution '{}' not found",
                execution_id
            ))),
        }
    }

    async fn remove_cached(&self, execution_id: &str) -> Result<()> {
        self.cached.remove(execution_id);
        Ok(())
    }

    async fn persist_result(&self, task_kind: &str, result: &GenerationResult) -> Result<()> {
        self.results
            .entry(task_kind.to_string())
            .or_default()
            .push(result.clone());
        Ok(())
    }
}
