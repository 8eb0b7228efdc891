//! Error types for provider implementations.

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur when talking to a provider.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API authentication failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Credential not found in the environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// The provider answered with something unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// General provider-side failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Configuration problem.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether a fallback attempt against another backend makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Http(_) | BackendError::RateLimited(_) | BackendError::Provider(_)
        )
    }
}

impl From<BackendError> for plume_core::EngineError {
    fn from(err: BackendError) -> Self {
        plume_core::EngineError::Backend(err.to_string())
    }
}
