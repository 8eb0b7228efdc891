//! Network-backed providers for the plume engine.
//!
//! Implements the `plume-core` collaborator traits against real services:
//!
//! - [`remote::ChatCompletionBackend`] - a chat-completions HTTP backend
//!   (OpenAI-compatible wire shape, which most hosted and local servers
//!   speak).
//! - [`embedding::HttpEmbedder`] - an embeddings endpoint client.
//! - [`embedding::HashEmbedder`] - a deterministic, dependency-free
//!   fallback embedder for tests and offline deployments.
//!
//! Clients never retry internally: the engine's state machine owns the
//! single-fallback policy, and the engine's deadline bounds every call.

pub mod config;
pub mod embedding;
pub mod error;
pub mod remote;

pub use config::RemoteBackendConfig;
pub use embedding::{HashEmbedder, HttpEmbedder};
pub use error::{BackendError, Result};
pub use remote::ChatCompletionBackend;
