//! Similarity-based result caching with a verification gate.
//!
//! Requests are fingerprinted by an embedding; previously produced results
//! for the same task kind are searched by cosine similarity. Embedding
//! similarity alone produces false positives, so a hit must additionally
//! clear a verification gate: identity-bearing context fields must match
//! exactly, and optionally a low-cost backend is asked a one-shot yes/no
//! confirmation. When that confirmation call fails or is inconclusive the
//! configured policy applies; the default trusts the hit, trading strict
//! correctness for availability.
//!
//! Only results whose quality cleared the write floor are ever written;
//! reuse increments the entry's hit count atomically; a sweep removes
//! low-quality and stale entries, sparing frequently reused ones.

use crate::parse::parse_structured;
use crate::text::truncate_chars;
use parking_lot::RwLock;
use plume_core::config::{CacheSettings, EngineConfig, VerifyPolicy};
use plume_core::error::Result;
use plume_core::models::cache::{CacheMatch, CachedExecution, CachedResult};
use plume_core::models::generation::{GenerationParams, RequestContext};
use plume_core::traits::{Clock, ExecutionStore, TextBackend};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Hit/miss accounting for the cache layer.
#[derive(Debug, Default, Clone)]
pub struct CacheMetrics {
    /// Verified hits returned to callers.
    pub hits: u64,

    /// Misses of any kind (below threshold, identity rejection, rejected
    /// confirmation, empty cache).
    pub misses: u64,

    /// Similarity hits rejected by the identity gate.
    pub identity_rejections: u64,

    /// Entries removed by sweeps.
    pub evictions: u64,
}

impl CacheMetrics {
    /// Fraction of lookups that hit.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Similarity cache over previously produced generation results.
#[derive(Clone)]
pub struct SemanticCache {
    store: Arc<dyn ExecutionStore>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    thresholds: HashMap<String, f64>,
    verifier: Option<Arc<dyn TextBackend>>,
    metrics: Arc<RwLock<CacheMetrics>>,
}

impl SemanticCache {
    /// Create a cache over a store, pulling thresholds from the engine
    /// config.
    pub fn new(store: Arc<dyn ExecutionStore>, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        let thresholds = config
            .tasks
            .iter()
            .filter_map(|(kind, task)| task.similarity_threshold.map(|t| (kind.clone(), t)))
            .collect();

        Self {
            store,
            clock,
            settings: config.cache.clone(),
            thresholds,
            verifier: None,
            metrics: Arc::new(RwLock::new(CacheMetrics::default())),
        }
    }

    /// Builder: confirm hits against this low-cost backend.
    pub fn with_verifier(mut self, backend: Arc<dyn TextBackend>) -> Self {
        self.verifier = Some(backend);
        self
    }

    /// Current metrics snapshot.
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.read().clone()
    }

    fn threshold_for(&self, task_kind: &str) -> f64 {
        self.thresholds
            .get(task_kind)
            .copied()
            .unwrap_or(self.settings.default_similarity_threshold)
    }

    /// Find a reusable result for a fingerprint.
    ///
    /// Returns the single highest-similarity candidate at or above the
    /// task kind's threshold, after the verification gate. Dimension
    /// mismatches between stored and query fingerprints are skipped, not
    /// errors.
    pub async fn find_similar(
        &self,
        fingerprint: &[f32],
        task_kind: &str,
        context: &RequestContext,
    ) -> Result<Option<CacheMatch>> {
        let entries = self.store.cached_for_kind(task_kind).await?;
        let now = self.clock.now();

        let mut best: Option<(CachedExecution, f64)> = None;
        for entry in entries {
            if entry.is_expired(now) && entry.hit_count < self.settings.pinned_hits {
                continue;
            }
            let Some(similarity) = cosine_similarity(fingerprint, &entry.fingerprint) else {
                continue;
            };
            if best.as_ref().map(|(_, s)| similarity > *s).unwrap_or(true) {
                best = Some((entry, similarity));
            }
        }

        let Some((cached, similarity)) = best else {
            self.metrics.write().misses += 1;
            return Ok(None);
        };

        let threshold = self.threshold_for(task_kind);
        if similarity < threshold {
            debug!(
                task_kind,
                similarity, threshold, "best candidate below similarity threshold"
            );
            self.metrics.write().misses += 1;
            return Ok(None);
        }

        // Identity gate: a mismatch on any shared identity field is an
        // unconditional miss, no matter how similar the fingerprints are.
        if !identity_matches(&cached.seed_context, &context.identity) {
            warn!(
                task_kind,
                execution_id = %cached.execution_id,
                similarity,
                "similarity hit rejected on identity fields"
            );
            let mut metrics = self.metrics.write();
            metrics.identity_rejections += 1;
            metrics.misses += 1;
            return Ok(None);
        }

        if self.settings.verify_with_backend {
            if let Some(verifier) = &self.verifier {
                match self.confirm(verifier.as_ref(), &cached, task_kind).await {
                    Some(true) => {}
                    Some(false) => {
                        debug!(execution_id = %cached.execution_id, "confirmation rejected cached result");
                        self.metrics.write().misses += 1;
                        return Ok(None);
                    }
                    None => match self.settings.verify_policy {
                        VerifyPolicy::TrustOnFailure => {
                            warn!(
                                execution_id = %cached.execution_id,
                                "confirmation inconclusive; trusting cached result"
                            );
                        }
                        VerifyPolicy::MissOnFailure => {
                            self.metrics.write().misses += 1;
                            return Ok(None);
                        }
                    },
                }
            }
        }

        if let Err(e) = self.store.record_cache_hit(&cached.execution_id).await {
            warn!(error = %e, execution_id = %cached.execution_id, "failed to record cache hit");
        }
        self.metrics.write().hits += 1;
        info!(
            task_kind,
            execution_id = %cached.execution_id,
            similarity,
            "cache hit"
        );

        Ok(Some(CacheMatch { cached, similarity }))
    }

    /// One-shot yes/no confirmation against the verifier backend.
    ///
    /// `Some(bool)` is a clear answer; `None` means the call failed or the
    /// answer was unclear.
    async fn confirm(
        &self,
        verifier: &dyn TextBackend,
        cached: &CachedExecution,
        task_kind: &str,
    ) -> Option<bool> {
        let prompt = format!(
            "A cached result exists for a similar {} request.\n\
             Cached result excerpt:\n{}\n\n\
             Is this cached result usable for the new request? Answer yes or no.",
            task_kind,
            truncate_chars(&cached.result.content, 240),
        );
        let params = GenerationParams::default()
            .with_temperature(0.0)
            .with_max_output_size(8);

        match verifier.generate(&prompt, &params).await {
            Ok(response) => parse_affirmation(&response.content),
            Err(e) => {
                debug!(error = %e, "confirmation call failed");
                None
            }
        }
    }

    /// Write a result to the cache.
    ///
    /// Results below the quality floor are discarded, never written.
    /// Returns whether an entry was created.
    pub async fn put(
        &self,
        execution_id: String,
        task_kind: String,
        fingerprint: Vec<f32>,
        result: CachedResult,
        seed_context: BTreeMap<String, String>,
        quality: u8,
    ) -> Result<bool> {
        if quality < self.settings.write_floor {
            debug!(
                execution_id = %execution_id,
                quality,
                floor = self.settings.write_floor,
                "result below cache write floor, discarded"
            );
            return Ok(false);
        }

        let now = self.clock.now();
        let entry = CachedExecution {
            fingerprint_hash: fingerprint_hash(&fingerprint),
            execution_id,
            task_kind,
            fingerprint,
            result,
            quality,
            seed_context,
            created_at: now,
            last_used_at: now,
            hit_count: 0,
            expires_at: Some(now + chrono::Duration::days(self.settings.retention_days)),
        };
        self.store.append_cached(entry).await?;
        Ok(true)
    }

    /// Remove low-quality and stale entries for a task kind.
    ///
    /// Entries with enough hits are pinned against age-based removal;
    /// the quality floor applies regardless, since a bad result does not
    /// get better by being popular.
    pub async fn sweep(&self, task_kind: &str) -> Result<usize> {
        let entries = self.store.cached_for_kind(task_kind).await?;
        let now = self.clock.now();
        let retention = chrono::Duration::days(self.settings.retention_days);

        let mut removed = 0usize;
        for entry in entries {
            let pinned = entry.hit_count >= self.settings.pinned_hits;
            let low_quality = entry.quality < self.settings.sweep_floor;
            let stale = now - entry.last_used_at > retention
                && entry.hit_count < self.settings.retention_min_hits;

            if low_quality || (!pinned && (entry.is_expired(now) || stale)) {
                self.store.remove_cached(&entry.execution_id).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            self.metrics.write().evictions += removed as u64;
        }
        info!(task_kind, removed, "cache sweep finished");
        Ok(removed)
    }
}

/// Cosine similarity between two vectors.
///
/// `None` on dimension mismatch or zero-magnitude input; the caller skips
/// such candidates rather than failing the search.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Short stable hash of a fingerprint vector.
fn fingerprint_hash(fingerprint: &[f32]) -> String {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for value in fingerprint {
        value.to_bits().hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// Whether two identity maps agree on every shared key.
///
/// Keys present on only one side are not a mismatch; absent identity
/// information passes the gate.
fn identity_matches(cached: &BTreeMap<String, String>, request: &BTreeMap<String, String>) -> bool {
    request.iter().all(|(key, value)| {
        cached
            .get(key)
            .map(|cached_value| cached_value == value)
            .unwrap_or(true)
    })
}

/// Classify a confirmation reply as a clear yes, a clear no, or unclear.
fn parse_affirmation(reply: &str) -> Option<bool> {
    #[derive(Deserialize)]
    struct Structured {
        usable: bool,
    }

    // Some backends answer in JSON despite the yes/no instruction.
    if let Some(structured) = parse_structured::<Structured>(reply).into_value() {
        return Some(structured.usable);
    }

    let first_word: String = reply
        .trim()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();

    match first_word.as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}
