//! Provider configuration.

use crate::error::{BackendError, Result};
use std::time::Duration;

/// Configuration for a remote HTTP provider.
#[derive(Debug, Clone)]
pub struct RemoteBackendConfig {
    /// Identifier the engine routes by; must match a descriptor in the
    /// store.
    pub backend_id: String,

    /// API key.
    pub api_key: String,

    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Model name sent with every request.
    pub model: String,

    /// HTTP client timeout. The engine's own deadline is usually
    /// tighter; this is a transport-level backstop.
    pub timeout: Duration,
}

impl RemoteBackendConfig {
    /// Create a configuration with an explicit key.
    pub fn new(
        backend_id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Create a configuration reading the key from an environment
    /// variable.
    pub fn from_env(
        backend_id: impl Into<String>,
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| BackendError::ApiKeyNotFound(env_var.to_string()))?;
        Ok(Self::new(backend_id, api_key, base_url, model))
    }

    /// Builder: override the transport timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
