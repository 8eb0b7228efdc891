//! Generation requests, execution logs, and results.

use crate::models::prompt::PromptModule;
use crate::models::routing::RoutingSignals;
use crate::models::rules::{CheckConstraints, RuleCheckResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sampling parameters passed through to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum output size in tokens.
    pub max_output_size: u32,
}

impl GenerationParams {
    /// Builder: set the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Builder: set the output cap.
    pub fn with_max_output_size(mut self, max_output_size: u32) -> Self {
        self.max_output_size = max_output_size;
        self
    }

    /// Tightened parameters for a corrective retry.
    pub fn stricter(&self) -> Self {
        Self {
            temperature: (self.temperature * 0.7).max(0.1),
            max_output_size: self.max_output_size,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_size: 4096,
        }
    }
}

/// Identity-bearing context of a request.
///
/// The keys are the fields the cache verification gate compares exactly
/// (e.g. chapter or scene identifiers); a mismatch on any shared key makes
/// a similarity hit an unconditional miss.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Identity fields by name.
    #[serde(default)]
    pub identity: BTreeMap<String, String>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an identity field.
    pub fn with_identity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.identity.insert(key.into(), value.into());
        self
    }
}

/// A single unit-of-content generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Named category of the request; scopes budgets, timeouts, and cache
    /// lookups.
    pub task_kind: String,

    /// Text the request fingerprint is computed from.
    pub seed_text: String,

    /// Candidate prompt modules, built fresh by the caller.
    pub modules: Vec<PromptModule>,

    /// Difficulty/cost signals for routing.
    pub signals: RoutingSignals,

    /// Constraints the produced content is checked against.
    pub constraints: CheckConstraints,

    /// Identity-bearing context for cache verification.
    pub context: RequestContext,

    /// Backend sampling parameters.
    pub params: GenerationParams,
}

impl GenerationRequest {
    /// Create a request with default signals, constraints, and params.
    pub fn new(task_kind: impl Into<String>, seed_text: impl Into<String>) -> Self {
        Self {
            task_kind: task_kind.into(),
            seed_text: seed_text.into(),
            modules: Vec::new(),
            signals: RoutingSignals::default(),
            constraints: CheckConstraints::default(),
            context: RequestContext::default(),
            params: GenerationParams::default(),
        }
    }

    /// Builder: set the prompt modules.
    pub fn with_modules(mut self, modules: Vec<PromptModule>) -> Self {
        self.modules = modules;
        self
    }

    /// Builder: set the routing signals.
    pub fn with_signals(mut self, signals: RoutingSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Builder: set the check constraints.
    pub fn with_constraints(mut self, constraints: CheckConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Builder: set the identity context.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Builder: set the sampling parameters.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// Outcome of one backend invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The backend returned content.
    Succeeded,
    /// The hard deadline elapsed.
    TimedOut,
    /// Transport or provider failure.
    Failed(String),
}

/// Record of one backend invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Backend the attempt ran against.
    pub backend_id: String,

    /// What happened.
    pub outcome: AttemptOutcome,

    /// Wall time of the attempt.
    pub elapsed_ms: u64,
}

/// Execution trace of a handled request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Unique execution id.
    pub execution_id: String,

    /// Backend that produced the final content, if any was invoked.
    pub backend_id: Option<String>,

    /// Whether the fallback backend was used.
    pub fallback_used: bool,

    /// Every backend invocation, in order.
    pub attempts: Vec<AttemptRecord>,

    /// Fraction of the prompt budget the packed prompt consumed.
    pub budget_fraction: f64,

    /// Total tokens spent across attempts.
    pub tokens_used: u64,

    /// Similarity of the cache hit, when the result came from the cache.
    pub cache_similarity: Option<f64>,
}

impl ExecutionLog {
    /// Create an empty log for an execution id.
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            backend_id: None,
            fallback_used: false,
            attempts: Vec::new(),
            budget_fraction: 0.0,
            tokens_used: 0,
            cache_similarity: None,
        }
    }
}

/// Final output of the engine for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The produced (or reused) content.
    pub content: String,

    /// Rule-check outcome for the content.
    pub check: RuleCheckResult,

    /// Execution trace.
    pub log: ExecutionLog,

    /// Whether the content came from the cache without any backend call.
    pub cache_hit: bool,
}
