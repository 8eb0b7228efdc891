//! Test doubles for the collaborator traits.
//!
//! Shared by the engine's unit and integration tests; also useful to
//! downstream applications that want to exercise their own flows without
//! network calls.

use crate::error::{EngineError, Result};
use crate::models::generation::GenerationParams;
use crate::traits::{BackendResponse, Clock, EmbeddingProvider, TextBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted backend reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this content.
    Content(String),
    /// Fail with a backend error carrying this message.
    Error(String),
}

/// A backend that replays a fixed script of replies.
///
/// Replies are consumed front to back; when the script runs dry the last
/// behavior repeats. An optional per-call delay lets tests drive the
/// engine's deadline handling.
pub struct ScriptedBackend {
    id: String,
    replies: Mutex<VecDeque<ScriptedReply>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    /// Create a backend that always returns the same content.
    pub fn always(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_script(id, vec![ScriptedReply::Content(content.into())])
    }

    /// Create a backend that replays the given script.
    pub fn with_script(id: impl Into<String>, replies: Vec<ScriptedReply>) -> Self {
        Self {
            id: id.into(),
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Builder: sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> ScriptedReply {
        let mut replies = self.replies.lock();
        if replies.len() > 1 {
            replies.pop_front().expect("script not empty")
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| ScriptedReply::Error("script exhausted".to_string()))
        }
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<BackendResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_reply() {
            ScriptedReply::Content(content) => {
                let tokens_used = (content.len() / 4) as u64;
                Ok(BackendResponse {
                    content,
                    tokens_used,
                })
            }
            ScriptedReply::Error(message) => Err(EngineError::Backend(message)),
        }
    }
}

/// An embedder that returns a fixed vector, or "unavailable".
pub struct StaticEmbedder {
    vector: Option<Vec<f32>>,
}

impl StaticEmbedder {
    /// Always return this vector.
    pub fn fixed(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
        }
    }

    /// Always report embedding unavailable.
    pub fn unavailable() -> Self {
        Self { vector: None }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.vector.clone())
    }
}

/// A clock pinned to a fixed instant, with sequential ids.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    counter: AtomicU64,
}

impl FixedClock {
    /// Create a clock pinned to `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            counter: AtomicU64::new(0),
        }
    }

    /// Advance the clock.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock();
        *now = *now + delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("exec-{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_backend_replays() {
        let backend = ScriptedBackend::with_script(
            "mock",
            vec![
                ScriptedReply::Error("transient".to_string()),
                ScriptedReply::Content("recovered".to_string()),
            ],
        );

        let params = GenerationParams::default();
        assert!(backend.generate("p", &params).await.is_err());
        let response = backend.generate("p", &params).await.unwrap();
        assert_eq!(response.content, "recovered");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_backend_repeats_last() {
        let backend = ScriptedBackend::always("mock", "same");
        let params = GenerationParams::default();

        for _ in 0..3 {
            let response = backend.generate("p", &params).await.unwrap();
            assert_eq!(response.content, "same");
        }
    }

    #[tokio::test]
    async fn test_static_embedder() {
        let embedder = StaticEmbedder::fixed(vec![0.5, 0.5]);
        assert_eq!(embedder.embed("x").await.unwrap(), Some(vec![0.5, 0.5]));

        let offline = StaticEmbedder::unavailable();
        assert_eq!(offline.embed("x").await.unwrap(), None);
    }

    #[test]
    fn test_fixed_clock() {
        let start = Utc::now();
        let clock = FixedClock::at(start);

        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::days(2));
        assert_eq!(clock.now(), start + chrono::Duration::days(2));

        assert_eq!(clock.next_id(), "exec-0");
        assert_eq!(clock.next_id(), "exec-1");
    }
}
