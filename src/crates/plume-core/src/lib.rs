//! Core types and collaborator contracts for the plume generation engine.
//!
//! This crate defines the data model shared by the engine subsystems
//! (prompt packing, backend routing, semantic caching, rule checking) and
//! the abstract contracts the engine consumes from its surroundings:
//! text-generation backends, embedding providers, the execution store, and
//! the clock/id source. Concrete network-backed implementations live in the
//! `backends` crate; an in-memory store suitable for tests and
//! single-process deployments ships here as [`MemoryStore`].
//!
//! # Design Principles
//!
//! 1. **Explicit structs**: every value passed between subsystems is a
//!    typed struct or enum validated at construction, not a loose record.
//! 2. **Injected collaborators**: all external effects go through
//!    `Arc<dyn ...>` trait objects so the engine can be driven entirely by
//!    test doubles (see [`testing`]).
//! 3. **Async-first**: every collaborator call is a suspension point;
//!    nothing in this crate blocks.

pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod testing;
pub mod traits;

pub use config::{CacheSettings, CheckerSettings, EngineConfig, TaskKindConfig, VerifyPolicy};
pub use error::{EngineError, Result};
pub use models::cache::{CacheMatch, CachedExecution, CachedResult};
pub use models::generation::{
    AttemptOutcome, AttemptRecord, ExecutionLog, GenerationParams, GenerationRequest,
    GenerationResult, RequestContext,
};
pub use models::prompt::{
    estimate_units, CompressionKind, ModuleOutcome, ModulePriority, ModuleStatus, PackedPrompt,
    PromptModule,
};
pub use models::routing::{
    BackendDescriptor, CapabilityTier, RoutingDecision, RoutingSignals, RoutingStrategy,
    TaskIntent,
};
pub use models::rules::{CheckConstraints, RuleCheckResult, RuleViolation, Severity};
pub use store::MemoryStore;
pub use traits::{BackendResponse, Clock, EmbeddingProvider, ExecutionStore, SystemClock, TextBackend};
