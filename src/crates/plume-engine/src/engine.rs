//! The per-request orchestration state machine.
//!
//! A request moves through cache check, routing, packing, generation,
//! rule checking, and persistence. A verified cache hit short-circuits
//! straight to the result with zero backend cost. Generation runs under a
//! hard per-task deadline with at most one fallback attempt; a failed
//! rule check earns at most one corrective retry against the fallback.
//! Content that still fails its checks is persisted and surfaced with
//! `passed = false` rather than discarded. The cache write after
//! persistence is a detached task whose failure is logged, never fatal.

use crate::cache::SemanticCache;
use crate::checker::RuleChecker;
use crate::packer::PromptPacker;
use crate::router::ModelRouter;
use plume_core::config::EngineConfig;
use plume_core::error::{EngineError, Result};
use plume_core::models::cache::CachedResult;
use plume_core::models::generation::{
    AttemptOutcome, AttemptRecord, ExecutionLog, GenerationParams, GenerationRequest,
    GenerationResult,
};
use plume_core::models::rules::{RuleCheckResult, Severity};
use plume_core::traits::{Clock, EmbeddingProvider, ExecutionStore, SystemClock, TextBackend};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tooling::{format_duration, sanitize_for_logging, with_deadline, DeadlineError};
use tracing::{debug, error, info, warn};

/// Orchestrates one generation request end to end.
///
/// Holds one explicitly constructed instance of each subsystem and shares
/// its collaborators as trait objects, so every seam can be replaced by a
/// test double.
pub struct GenerationEngine {
    store: Arc<dyn ExecutionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    clock: Arc<dyn Clock>,
    clients: HashMap<String, Arc<dyn TextBackend>>,
    packer: PromptPacker,
    router: ModelRouter,
    cache: SemanticCache,
    checker: RuleChecker,
    config: EngineConfig,
}

impl GenerationEngine {
    /// Create an engine with the system clock.
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        Self::with_clock(store, embedder, config, Arc::new(SystemClock))
    }

    /// Create an engine with an injected clock.
    pub fn with_clock(
        store: Arc<dyn ExecutionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = SemanticCache::new(store.clone(), clock.clone(), &config);
        let checker = RuleChecker::with_settings(config.checker.clone());

        Self {
            store,
            embedder,
            clock,
            clients: HashMap::new(),
            packer: PromptPacker::new(),
            router: ModelRouter::new(),
            cache,
            checker,
            config,
        }
    }

    /// Builder: register a backend client under its own id.
    pub fn with_backend(mut self, backend: Arc<dyn TextBackend>) -> Self {
        self.clients.insert(backend.id().to_string(), backend);
        self
    }

    /// Builder: confirm cache hits against this low-cost backend.
    pub fn with_cache_verifier(mut self, backend: Arc<dyn TextBackend>) -> Self {
        self.cache = self.cache.clone().with_verifier(backend);
        self
    }

    /// The engine's cache layer, for sweeps and metrics.
    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle one generation request.
    ///
    /// Always returns either a [`GenerationResult`] (possibly with
    /// `check.passed == false`) or a fatal error naming the reason.
    pub async fn handle(&self, request: GenerationRequest) -> Result<GenerationResult> {
        if request.task_kind.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "task_kind must not be empty".to_string(),
            ));
        }

        let execution_id = self.clock.next_id();
        let task_config = self.config.task(&request.task_kind);
        info!(
            execution_id = %execution_id,
            task_kind = %request.task_kind,
            modules = request.modules.len(),
            "handling generation request"
        );

        // Fingerprint the request. Embedding unavailability is a forced
        // cache miss, not an error.
        let fingerprint = match self.embedder.embed(&request.seed_text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "embedding failed; continuing without cache");
                None
            }
        };

        if let Some(vector) = fingerprint.as_deref() {
            match self
                .cache
                .find_similar(vector, &request.task_kind, &request.context)
                .await
            {
                Ok(Some(hit)) => {
                    let content = hit.cached.result.content.clone();
                    let check = self.checker.check(&content, &request.constraints);
                    let mut log = ExecutionLog::new(&execution_id);
                    log.cache_similarity = Some(hit.similarity);
                    info!(
                        execution_id = %execution_id,
                        similarity = hit.similarity,
                        "verified cache hit, no backend invoked"
                    );
                    return Ok(GenerationResult {
                        content,
                        check,
                        log,
                        cache_hit: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "cache lookup failed; continuing"),
            }
        }

        // Routing. A missing backend registry is fatal.
        let descriptors = self.store.active_backends().await?;
        let decision = self.router.route(&request.signals, &descriptors)?;
        debug!(
            execution_id = %execution_id,
            strategy = %decision.strategy,
            reasoning = %decision.reasoning,
            "routed"
        );

        // Packing.
        let packed = self.packer.pack(&request.modules, task_config.prompt_budget);
        debug!(
            execution_id = %execution_id,
            total_size = packed.total_size,
            budget_fraction = packed.budget_fraction,
            "prompt packed"
        );

        // Generation and checking, with at most one fallback attempt.
        let deadline = Duration::from_secs(task_config.generation_timeout_secs);
        let mut log = ExecutionLog::new(&execution_id);
        log.budget_fraction = packed.budget_fraction;

        let primary = self.client(&decision.primary)?;
        let fallback = decision.fallback.as_deref().and_then(|id| {
            self.client(id)
                .map_err(|e| warn!(error = %e, "fallback backend has no client"))
                .ok()
        });

        let (content, check, final_backend) = match self
            .invoke(primary.as_ref(), &packed.text, &request.params, deadline, &mut log)
            .await
        {
            Ok(content) => {
                let check = self.checker.check(&content, &request.constraints);
                match (check.passed, &fallback) {
                    (true, _) | (false, None) => (content, check, primary.id().to_string()),
                    (false, Some(fallback_backend)) => {
                        log.fallback_used = true;
                        info!(
                            execution_id = %execution_id,
                            violations = check.violations.len(),
                            fallback = fallback_backend.id(),
                            "rule check failed; retrying with corrective instructions"
                        );
                        let corrective = corrective_prompt(&packed.text, &check);
                        let strict_params = request.params.stricter();
                        match self
                            .invoke(
                                fallback_backend.as_ref(),
                                &corrective,
                                &strict_params,
                                deadline,
                                &mut log,
                            )
                            .await
                        {
                            Ok(retried) => {
                                let recheck = self.checker.check(&retried, &request.constraints);
                                (retried, recheck, fallback_backend.id().to_string())
                            }
                            Err(e) => {
                                // Keep the first attempt's content; it is
                                // surfaced with its failing check rather
                                // than discarded.
                                warn!(error = %e, "corrective retry failed; keeping first attempt");
                                (content, check, primary.id().to_string())
                            }
                        }
                    }
                }
            }
            Err(first_error) => match &fallback {
                Some(fallback_backend) if first_error.is_fallback_eligible() => {
                    log.fallback_used = true;
                    warn!(
                        execution_id = %execution_id,
                        error = %first_error,
                        fallback = fallback_backend.id(),
                        "primary backend failed; retrying against fallback"
                    );
                    match self
                        .invoke(
                            fallback_backend.as_ref(),
                            &packed.text,
                            &request.params,
                            deadline,
                            &mut log,
                        )
                        .await
                    {
                        Ok(content) => {
                            let check = self.checker.check(&content, &request.constraints);
                            (content, check, fallback_backend.id().to_string())
                        }
                        Err(second_error) => {
                            error!(
                                execution_id = %execution_id,
                                attempts = log.attempts.len(),
                                error = %second_error,
                                "all generation attempts exhausted"
                            );
                            return Err(EngineError::GenerationExhausted {
                                attempts: log.attempts.len(),
                                reason: second_error.to_string(),
                            });
                        }
                    }
                }
                _ => {
                    error!(
                        execution_id = %execution_id,
                        attempts = log.attempts.len(),
                        error = %first_error,
                        "generation failed with no usable fallback"
                    );
                    return Err(EngineError::GenerationExhausted {
                        attempts: log.attempts.len(),
                        reason: first_error.to_string(),
                    });
                }
            },
        };

        log.backend_id = Some(final_backend);
        let result = GenerationResult {
            content,
            check,
            log,
            cache_hit: false,
        };

        // Persisting. The result is still returned to the caller when the
        // store write fails; the caller can re-persist.
        if let Err(e) = self.store.persist_result(&request.task_kind, &result).await {
            warn!(execution_id = %execution_id, error = %e, "failed to persist result");
        }

        // Detached cache write: its failure only ever logs.
        if let Some(vector) = fingerprint {
            let cache = self.cache.clone();
            let task_kind = request.task_kind.clone();
            let seed_context = request.context.identity.clone();
            let cached = CachedResult::new(result.content.clone());
            let quality = result.check.score;
            let id_for_cache = execution_id.clone();
            tokio::spawn(async move {
                match cache
                    .put(id_for_cache, task_kind, vector, cached, seed_context, quality)
                    .await
                {
                    Ok(written) => {
                        if written {
                            debug!("result cached");
                        }
                    }
                    Err(e) => warn!(error = %e, "detached cache write failed"),
                }
            });
        }

        Ok(result)
    }

    /// Invoke a backend under the deadline, recording the attempt.
    async fn invoke(
        &self,
        backend: &dyn TextBackend,
        prompt: &str,
        params: &GenerationParams,
        deadline: Duration,
        log: &mut ExecutionLog,
    ) -> Result<String> {
        let started = Instant::now();
        debug!(
            backend_id = backend.id(),
            prompt_excerpt = %sanitize_for_logging(crate::text::truncate_chars(prompt, 120)),
            "invoking backend"
        );

        match with_deadline(deadline, backend.generate(prompt, params)).await {
            Ok(response) => {
                debug!(
                    backend_id = backend.id(),
                    elapsed = %format_duration(started.elapsed()),
                    tokens = response.tokens_used,
                    "backend responded"
                );
                log.attempts.push(AttemptRecord {
                    backend_id: backend.id().to_string(),
                    outcome: AttemptOutcome::Succeeded,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                log.tokens_used += response.tokens_used;
                Ok(response.content)
            }
            Err(DeadlineError::Elapsed(limit)) => {
                log.attempts.push(AttemptRecord {
                    backend_id: backend.id().to_string(),
                    outcome: AttemptOutcome::TimedOut,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                Err(EngineError::BackendTimeout {
                    backend_id: backend.id().to_string(),
                    duration_secs: limit.as_secs(),
                })
            }
            Err(DeadlineError::Inner(e)) => {
                log.attempts.push(AttemptRecord {
                    backend_id: backend.id().to_string(),
                    outcome: AttemptOutcome::Failed(e.to_string()),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                Err(e)
            }
        }
    }

    fn client(&self, backend_id: &str) -> Result<Arc<dyn TextBackend>> {
        self.clients.get(backend_id).cloned().ok_or_else(|| {
            EngineError::NoBackendAvailable(format!(
                "backend '{}' has no registered client",
                backend_id
            ))
        })
    }
}

/// Append violation messages to a prompt as corrective instructions.
fn corrective_prompt(prompt: &str, check: &RuleCheckResult) -> String {
    let notes: String = check
        .violations
        .iter()
        .filter(|v| v.severity != Severity::Info)
        .map(|v| format!("- {}\n", v.message))
        .collect();

    format!(
        "{}\n\nRevise your output to address the following issues:\n{}",
        prompt, notes
    )
}
