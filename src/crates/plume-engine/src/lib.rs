//! Generation orchestration engine.
//!
//! Four cooperating decision subsystems plus the orchestrator that
//! sequences them per generation request:
//!
//! - [`packer`] - assembles candidate text modules into a single prompt
//!   under a token budget, compressing or omitting lower-priority modules.
//! - [`router`] - computes a routing score from difficulty/cost signals
//!   and selects a primary (and optionally fallback) backend.
//! - [`cache`] - searches previously produced results by fingerprint
//!   similarity, behind a verification gate against false positives.
//! - [`checker`] - fast deterministic quality checks with itemized
//!   violations, plus an optional backend-delegated semantic pass.
//! - [`engine`] - the per-request state machine: cache check, routing,
//!   packing, generation with a hard deadline and a single fallback
//!   attempt, rule checking with a single corrective retry, persistence,
//!   and a detached cache write.
//!
//! The engine is a library. Everything effectful is reached through the
//! collaborator traits in `plume-core`; network-backed implementations
//! live in the `backends` crate.

pub mod cache;
pub mod candidates;
pub mod checker;
pub mod engine;
pub mod packer;
pub mod parse;
pub mod router;
pub mod text;

pub use cache::{cosine_similarity, CacheMetrics, SemanticCache};
pub use candidates::select_best;
pub use checker::{RuleChecker, SemanticVerdict};
pub use engine::GenerationEngine;
pub use packer::PromptPacker;
pub use parse::{parse_structured, ParseOutcome};
pub use router::ModelRouter;
