//! Embedding providers used to fingerprint requests.
//!
//! [`HttpEmbedder`] talks to an embeddings endpoint; any failure there is
//! reported as "embedding unavailable" (`Ok(None)`), which the cache
//! layer treats as a forced miss; fingerprinting is an optimization, not
//! a correctness requirement. [`HashEmbedder`] is the deterministic
//! fallback: FNV-1a token hashing with no model files and no network,
//! capturing lexical overlap only.

use crate::config::RemoteBackendConfig;
use async_trait::async_trait;
use plume_core::error::Result;
use plume_core::traits::EmbeddingProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// FNV-1a offset basis (64-bit).
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a prime (64-bit).
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Tokens shorter than this are ignored.
const MIN_TOKEN_LEN: usize = 2;

/// Embeddings-endpoint client implementing [`EmbeddingProvider`].
#[derive(Clone)]
pub struct HttpEmbedder {
    config: RemoteBackendConfig,
    client: Client,
}

impl HttpEmbedder {
    /// Create an embedder from configuration.
    pub fn new(config: RemoteBackendConfig) -> crate::error::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(crate::error::BackendError::Http)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url);
        let body = EmbeddingRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "embedding endpoint unreachable");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "embedding request rejected");
            return Ok(None);
        }

        match response.json::<EmbeddingResponse>().await {
            Ok(parsed) => {
                let vector = parsed.data.into_iter().next().map(|d| d.embedding);
                if vector.is_none() {
                    debug!("embedding response carried no vectors");
                }
                Ok(vector)
            }
            Err(e) => {
                warn!(error = %e, "embedding response unparseable");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Deterministic hash-based embedder.
///
/// Each token FNV-hashes to one dimension, accumulating a sign taken from
/// the hash's high bit; the result is L2-normalized. Not semantic, but
/// always available, fast, and stable across processes; identical text
/// always produces an identical vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a hash embedder with the given dimension.
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "dimension must be > 0");
        Self { dimension }
    }

    /// Default 256-dimension embedder.
    pub fn default_256() -> Self {
        Self::new(256)
    }

    /// Synchronous embedding.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        for token in tokenize(text) {
            let hash = fnv1a(token);
            let index = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[index] += sign;
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        Ok(Some(self.embed_sync(text)))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
}

fn fnv1a(token: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in token.to_lowercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_deterministic() {
        let embedder = HashEmbedder::default_256();
        let a = embedder.embed_sync("Mara at the harbor");
        let b = embedder.embed_sync("Mara at the harbor");
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
    }

    #[test]
    fn test_hash_embedder_normalized() {
        let embedder = HashEmbedder::default_256();
        let vector = embedder.embed_sync("the keeper climbs the spiral stair");
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_case_insensitive_tokens() {
        let embedder = HashEmbedder::default_256();
        assert_eq!(
            embedder.embed_sync("HARBOR lights"),
            embedder.embed_sync("harbor LIGHTS")
        );
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let vector = embedder.embed_sync("");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_hash_embedder_always_available() {
        let embedder = HashEmbedder::default_256();
        let vector = embedder.embed("scene draft seed").await.unwrap();
        assert!(vector.is_some());
    }

    #[test]
    fn test_embedding_response_parsing() {
        let raw = r#"{"data": [{"embedding": [0.1, 0.2, 0.3]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data[0].embedding.len(), 3);
    }
}
