//! Chat-completions HTTP backend.
//!
//! Speaks the OpenAI-compatible chat-completions wire shape, which most
//! hosted providers and local inference servers accept. The assembled
//! prompt travels as a single user message; sampling parameters come from
//! the engine per request.

use crate::config::RemoteBackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use plume_core::error::Result;
use plume_core::models::generation::GenerationParams;
use plume_core::traits::{BackendResponse, TextBackend};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// HTTP chat-completions client implementing [`TextBackend`].
#[derive(Clone)]
pub struct ChatCompletionBackend {
    config: RemoteBackendConfig,
    client: Client,
}

impl ChatCompletionBackend {
    /// Create a backend from configuration.
    pub fn new(config: RemoteBackendConfig) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(BackendError::Http)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextBackend for ChatCompletionBackend {
    fn id(&self) -> &str {
        &self.config.backend_id
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<BackendResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: params.temperature,
            max_tokens: params.max_output_size,
            stream: false,
        };

        debug!(backend_id = %self.config.backend_id, model = %self.config.model, "chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(BackendError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            let error = match status.as_u16() {
                401 | 403 => BackendError::Authentication(detail),
                429 => BackendError::RateLimited(detail),
                _ => BackendError::Provider(format!("{}: {}", status, detail)),
            };
            return Err(error.into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("no choices in response".to_string()))?;

        let tokens_used = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);

        Ok(BackendResponse {
            content: choice.message.content.unwrap_or_default(),
            tokens_used,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}
