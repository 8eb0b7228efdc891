//! Cached execution records for similarity-based result reuse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Payload of a cached execution.
///
/// Opaque to the cache layer beyond the content field; `extra` carries
/// whatever the producing flow wants to round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    /// The produced text.
    pub content: String,

    /// Additional producer-specific payload.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl CachedResult {
    /// Create a result holding only content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            extra: serde_json::Value::Null,
        }
    }
}

/// A previously produced generation result, stored for reuse.
///
/// Created only when the producing generation's quality cleared the write
/// floor; mutated only by the atomic hit-count increment; removed by
/// expiry or the cleanup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExecution {
    /// Id of the execution that produced this entry.
    pub execution_id: String,

    /// Task kind this result answers; scopes similarity search.
    pub task_kind: String,

    /// Normalized fingerprint vector of the producing request.
    pub fingerprint: Vec<f32>,

    /// Short hash of the fingerprint, usable as a storage key.
    pub fingerprint_hash: String,

    /// The reusable payload.
    pub result: CachedResult,

    /// Quality score (0-100) of the producing generation.
    pub quality: u8,

    /// Identity-bearing fields of the producing request context, checked
    /// by the verification gate before a similarity hit is trusted.
    #[serde(default)]
    pub seed_context: BTreeMap<String, String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last reuse timestamp.
    pub last_used_at: DateTime<Utc>,

    /// Number of times this entry satisfied a request.
    pub hit_count: u64,

    /// Hard expiry; entries past this point are ignored and swept.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedExecution {
    /// Whether the entry is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| now > e).unwrap_or(false)
    }
}

/// A similarity-search hit.
#[derive(Debug, Clone)]
pub struct CacheMatch {
    /// The matched entry.
    pub cached: CachedExecution,

    /// Cosine similarity between query and stored fingerprint.
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(expires_at: Option<DateTime<Utc>>) -> CachedExecution {
        let now = Utc::now();
        CachedExecution {
            execution_id: "exec-1".to_string(),
            task_kind: "scene_draft".to_string(),
            fingerprint: vec![1.0, 0.0],
            fingerprint_hash: "abcd".to_string(),
            result: CachedResult::new("a scene"),
            quality: 85,
            seed_context: BTreeMap::new(),
            created_at: now,
            last_used_at: now,
            hit_count: 0,
            expires_at,
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();

        assert!(!entry(None).is_expired(now));
        assert!(!entry(Some(now + Duration::hours(1))).is_expired(now));
        assert!(entry(Some(now - Duration::hours(1))).is_expired(now));
    }
}
