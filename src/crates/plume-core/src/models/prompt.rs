//! Prompt module and packed prompt types.

use serde::{Deserialize, Serialize};

/// Approximate tokens-per-character ratio used for budget accounting.
///
/// Matches the common ~4 chars/token approximation for chat models; the
/// same estimator is applied to module estimation and compression targets
/// so packing decisions stay internally consistent.
const UNITS_PER_CHAR: f64 = 0.25;

/// Estimate the budget-unit cost of a piece of text.
pub fn estimate_units(text: &str) -> u32 {
    (text.chars().count() as f64 * UNITS_PER_CHAR).ceil() as u32
}

/// Inclusion priority of a prompt module.
///
/// Lower tiers are packed first; must-have content is never silently
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulePriority {
    /// Always present in the assembled prompt, compressed if necessary.
    MustHave = 0,
    /// Included when the budget allows, compressible.
    Important = 1,
    /// First to be compressed or omitted.
    Optional = 2,
}

impl std::fmt::Display for ModulePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MustHave => write!(f, "must_have"),
            Self::Important => write!(f, "important"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// A unit of text eligible for inclusion in an assembled prompt.
///
/// Immutable once constructed for a request; callers build a fresh set per
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptModule {
    /// Unique id within a request.
    pub id: String,

    /// Inclusion priority.
    pub priority: ModulePriority,

    /// The module text.
    pub content: String,

    /// Estimated size in budget units.
    pub estimated_size: u32,

    /// Whether the packer may compress this module to fit.
    pub compressible: bool,
}

impl PromptModule {
    /// Create a module, estimating its size from the content.
    pub fn new(id: impl Into<String>, priority: ModulePriority, content: impl Into<String>) -> Self {
        let content = content.into();
        let estimated_size = estimate_units(&content);
        Self {
            id: id.into(),
            priority,
            content,
            estimated_size,
            compressible: true,
        }
    }

    /// Builder: override the estimated size.
    pub fn with_estimated_size(mut self, units: u32) -> Self {
        self.estimated_size = units;
        self
    }

    /// Builder: mark the module as non-compressible.
    pub fn not_compressible(mut self) -> Self {
        self.compressible = false;
        self
    }
}

/// What happened to a module during packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Included verbatim.
    Included,
    /// Included in a compressed form.
    Compressed,
    /// Left out of the assembled prompt.
    Omitted,
}

/// How a module was compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    /// Replaced by a short fixed-length content digest.
    Placeholder,
    /// Leading sentences kept up to the target size.
    LeadingSentences,
    /// Key-point lines (colon, enumerator, bullet) extracted.
    KeyPoints,
}

/// Per-module packing outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutcome {
    /// Module id.
    pub id: String,

    /// Inclusion status.
    pub status: ModuleStatus,

    /// Compression applied, when status is `Compressed`.
    pub compression: Option<CompressionKind>,

    /// Estimated size before packing.
    pub original_size: u32,

    /// Size actually contributed to the assembled prompt.
    pub final_size: u32,
}

/// An assembled prompt that fits (or documents why it exceeds) a budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedPrompt {
    /// Final prompt text, modules joined in priority order.
    pub text: String,

    /// Outcome per input module.
    pub outcomes: Vec<ModuleOutcome>,

    /// Total size of the assembled text in budget units.
    pub total_size: u32,

    /// `total_size / budget`; may exceed 1.0 only in the documented
    /// must-have forced-compression case.
    pub budget_fraction: f64,

    /// Short content fingerprint of the final text, consumed by the
    /// caching layer.
    pub signature: String,
}

impl PackedPrompt {
    /// Outcome for a specific module id, if it was part of the input.
    pub fn outcome(&self, id: &str) -> Option<&ModuleOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}
