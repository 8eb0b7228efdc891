//! Shared utilities for the plume workspace.
//!
//! Deliberately small: deadline handling for backend calls and logging
//! helpers. Anything with domain knowledge belongs in `plume-core` or
//! `plume-engine`.

pub mod log;
pub mod time;

pub use log::{format_duration, init_tracing, sanitize_for_logging};
pub use time::{with_deadline, DeadlineError};
