//! Engine configuration.
//!
//! Serde-backed config structs with defaults that match the engine's
//! documented behavior; loadable from a TOML file. Task kinds not listed
//! in the file fall back to [`TaskKindConfig::default`].

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Behavior of the cache verification gate when the confirmation call
/// fails or is inconclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyPolicy {
    /// Trust the similarity hit; availability over strictness.
    TrustOnFailure,
    /// Treat the hit as a miss and regenerate.
    MissOnFailure,
}

/// Cache layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Minimum quality for a result to be written to the cache.
    pub write_floor: u8,

    /// Entries below this quality are removed by the sweep.
    pub sweep_floor: u8,

    /// Days an unpopular entry may go unused before the sweep removes it.
    pub retention_days: i64,

    /// Entries with fewer hits than this are eligible for retention-based
    /// removal.
    pub retention_min_hits: u64,

    /// Entries with at least this many hits are never swept.
    pub pinned_hits: u64,

    /// Similarity threshold applied when a task kind has no override.
    pub default_similarity_threshold: f64,

    /// Whether to confirm similarity hits with a low-cost backend call.
    pub verify_with_backend: bool,

    /// Degrade behavior for failed/inconclusive verification calls.
    pub verify_policy: VerifyPolicy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            write_floor: 70,
            sweep_floor: 50,
            retention_days: 30,
            retention_min_hits: 3,
            pinned_hits: 5,
            default_similarity_threshold: 0.95,
            verify_with_backend: false,
            verify_policy: VerifyPolicy::TrustOnFailure,
        }
    }
}

/// Rule checker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    /// Normalized edit-distance similarity above which two sentences are
    /// flagged as near-duplicates.
    pub near_duplicate_threshold: f64,

    /// How many partial-form occurrences of an entity name are tolerated
    /// before naming inconsistency is flagged.
    pub naming_variant_limit: usize,

    /// Dialogue-density band applied when constraints carry none.
    pub default_dialogue_band: (f64, f64),
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            near_duplicate_threshold: 0.8,
            naming_variant_limit: 3,
            default_dialogue_band: (0.05, 0.7),
        }
    }
}

/// Per-task-kind knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskKindConfig {
    /// Prompt budget in units for this task kind.
    pub prompt_budget: u32,

    /// Hard deadline for one backend invocation.
    pub generation_timeout_secs: u64,

    /// Cache similarity threshold override; stricter for exact-structure
    /// kinds.
    pub similarity_threshold: Option<f64>,
}

impl Default for TaskKindConfig {
    fn default() -> Self {
        Self {
            prompt_budget: 2000,
            generation_timeout_secs: 90,
            similarity_threshold: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache layer settings.
    pub cache: CacheSettings,

    /// Rule checker settings.
    pub checker: CheckerSettings,

    /// Per-task-kind overrides, keyed by task kind name.
    pub tasks: HashMap<String, TaskKindConfig>,

    /// Concurrent candidates per breadth-generation batch.
    pub candidate_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            checker: CheckerSettings::default(),
            tasks: HashMap::new(),
            candidate_batch_size: 3,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Config(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Settings for a task kind, falling back to defaults.
    pub fn task(&self, task_kind: &str) -> TaskKindConfig {
        self.tasks.get(task_kind).cloned().unwrap_or_default()
    }

    /// Cache similarity threshold for a task kind.
    pub fn similarity_threshold(&self, task_kind: &str) -> f64 {
        self.task(task_kind)
            .similarity_threshold
            .unwrap_or(self.cache.default_similarity_threshold)
    }

    /// Builder: set a task kind's settings.
    pub fn with_task(mut self, task_kind: impl Into<String>, config: TaskKindConfig) -> Self {
        self.tasks.insert(task_kind.into(), config);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.candidate_batch_size == 0 {
            return Err(EngineError::Config(
                "candidate_batch_size must be greater than 0".to_string(),
            ));
        }
        for (kind, task) in &self.tasks {
            if task.prompt_budget == 0 {
                return Err(EngineError::Config(format!(
                    "task '{}' has a zero prompt budget",
                    kind
                )));
            }
            if let Some(threshold) = task.similarity_threshold {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(EngineError::Config(format!(
                        "task '{}' similarity threshold {} outside [0, 1]",
                        kind, threshold
                    )));
                }
            }
        }
        Ok(())
    }
}
