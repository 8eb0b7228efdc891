//! Collaborator contracts consumed by the engine.
//!
//! The engine is a library: it owns no network protocol, no persistence
//! format, and no UI. Everything effectful is reached through the traits
//! in this module, implemented by whatever surrounds the engine. The
//! `backends` crate ships network-backed implementations; [`crate::store`]
//! and [`crate::testing`] ship in-process ones.
//!
//! Implementations must be `Send + Sync`; the engine shares them as
//! `Arc<dyn ...>` across detached tasks.

use crate::error::Result;
use crate::models::cache::CachedExecution;
use crate::models::generation::{GenerationParams, GenerationResult};
use crate::models::routing::BackendDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Response of a text-generation backend.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// The generated text.
    pub content: String,

    /// Tokens consumed by the call.
    pub tokens_used: u64,
}

/// A text-generation backend.
///
/// Transport and rate-limit failures should surface as
/// [`crate::EngineError::Backend`]; the engine treats them as eligible for
/// a single fallback attempt. Implementations must not retry internally -
/// retry policy belongs to the engine's state machine.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Identifier matching a [`BackendDescriptor`] in the store.
    fn id(&self) -> &str;

    /// Generate text for an assembled prompt.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<BackendResponse>;
}

/// An embedding provider used to fingerprint requests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed text into a normalized vector.
    ///
    /// `Ok(None)` means "embedding unavailable" and is not an error; the
    /// cache layer treats it as a forced miss.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>>;
}

/// Read/write access to execution state owned by the surrounding
/// application.
///
/// The backend registry is read-only from the engine's perspective.
/// Cached executions are append-only except for the hit-count increment,
/// which implementations must make atomic (no read-modify-write races
/// under concurrent hits).
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Descriptors of currently usable backends.
    async fn active_backends(&self) -> Result<Vec<BackendDescriptor>>;

    /// All cached executions for a task kind.
    async fn cached_for_kind(&self, task_kind: &str) -> Result<Vec<CachedExecution>>;

    /// Append a new cached execution.
    async fn append_cached(&self, entry: CachedExecution) -> Result<()>;

    /// Atomically increment the hit count of a cached execution and bump
    /// its last-used timestamp.
    async fn record_cache_hit(&self, execution_id: &str) -> Result<()>;

    /// Remove a cached execution.
    async fn remove_cached(&self, execution_id: &str) -> Result<()>;

    /// Persist a final generation result and its execution log.
    async fn persist_result(&self, task_kind: &str, result: &GenerationResult) -> Result<()>;
}

/// Time and id source.
///
/// Injected instead of calling `Utc::now()`/`Uuid::new_v4()` inline so
/// TTL, retention, and id-dependent logic are testable with a fixed
/// clock.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// A fresh unique execution id.
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_ids_are_unique() {
        let clock = SystemClock;
        assert_ne!(clock.next_id(), clock.next_id());
    }
}
