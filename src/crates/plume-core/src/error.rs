//! Error types for the generation engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the generation engine and its collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No active backend satisfies the routing requirement.
    #[error("no backend available: {0}")]
    NoBackendAvailable(String),

    /// Every generation attempt (primary and fallback) failed.
    #[error("generation failed after {attempts} attempt(s): {reason}")]
    GenerationExhausted { attempts: usize, reason: String },

    /// A backend call exceeded its hard deadline.
    #[error("backend {backend_id} timed out after {duration_secs}s")]
    BackendTimeout { backend_id: String, duration_secs: u64 },

    /// Transport or provider failure during a backend call.
    #[error("backend error: {0}")]
    Backend(String),

    /// The embedding provider could not produce a vector.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Execution store failure.
    #[error("store error: {0}")]
    Store(String),

    /// The request was rejected before any work started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether a single fallback attempt against another backend is
    /// warranted for this error.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            EngineError::Backend(_) | EngineError::BackendTimeout { .. }
        )
    }

    /// Whether this error must be surfaced to the caller rather than
    /// recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::NoBackendAvailable(_)
                | EngineError::GenerationExhausted { .. }
                | EngineError::InvalidRequest(_)
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Other(err.to_string())
    }
}
