//! Rule-check violations, results, and the constraints they run against.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Score deduction per error-severity violation.
pub const ERROR_DEDUCTION: u32 = 20;

/// Score deduction per warning-severity violation.
pub const WARNING_DEDUCTION: u32 = 10;

/// Severity of a rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the check from passing.
    Error,
    /// Reported and deducted, does not block.
    Warning,
    /// Informational only, no deduction.
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single rule violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    /// Rule identifier, e.g. `entity.missing`.
    pub rule: String,

    /// Severity of the violation.
    pub severity: Severity,

    /// Human-readable description.
    pub message: String,

    /// Whether the issue can be repaired by editing the content, as
    /// opposed to regenerating it.
    pub auto_fixable: bool,
}

impl RuleViolation {
    /// Create an error-severity violation.
    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Error,
            message: message.into(),
            auto_fixable: false,
        }
    }

    /// Create a warning-severity violation.
    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Warning,
            message: message.into(),
            auto_fixable: false,
        }
    }

    /// Create an info-severity violation.
    pub fn info(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Info,
            message: message.into(),
            auto_fixable: false,
        }
    }

    /// Builder: mark the violation as auto-fixable.
    pub fn auto_fixable(mut self) -> Self {
        self.auto_fixable = true;
        self
    }
}

/// Outcome of a rule check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCheckResult {
    /// True iff no error-severity violations were found.
    pub passed: bool,

    /// 100 minus weighted deductions, floored at 0.
    pub score: u8,

    /// All violations found.
    pub violations: Vec<RuleViolation>,

    /// Wall time the check took.
    pub execution_time_ms: u64,
}

impl RuleCheckResult {
    /// Build a result from violations, computing score and pass state.
    pub fn from_violations(violations: Vec<RuleViolation>, elapsed: Duration) -> Self {
        let errors = violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count() as u32;
        let warnings = violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
            .count() as u32;

        let deduction = errors * ERROR_DEDUCTION + warnings * WARNING_DEDUCTION;
        let score = 100u32.saturating_sub(deduction) as u8;

        Self {
            passed: errors == 0,
            score,
            violations,
            execution_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// A passing result with no violations.
    pub fn clean() -> Self {
        Self::from_violations(Vec::new(), Duration::ZERO)
    }

    /// Violations of a given severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &RuleViolation> {
        self.violations.iter().filter(move |v| v.severity == severity)
    }
}

/// Constraints a piece of generated content is checked against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConstraints {
    /// Target content length in characters, when length matters.
    pub target_length: Option<u32>,

    /// Entity names that must appear in the content.
    #[serde(default)]
    pub required_entities: Vec<String>,

    /// Acceptable dialogue-density band `(min, max)` as a fraction of
    /// sentences that carry dialogue.
    pub dialogue_band: Option<(f64, f64)>,

    /// Additional forbidden patterns (regex source strings) on top of the
    /// built-in meta-commentary set.
    #[serde(default)]
    pub extra_forbidden: Vec<String>,

    /// Adjacent context preceding this content, for continuity checks.
    pub previous_context: Option<String>,

    /// Adjacent context following this content, for continuity checks.
    pub next_context: Option<String>,
}

impl CheckConstraints {
    /// Create empty constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the target length in characters.
    pub fn with_target_length(mut self, chars: u32) -> Self {
        self.target_length = Some(chars);
        self
    }

    /// Builder: add a required entity.
    pub fn with_required_entity(mut self, name: impl Into<String>) -> Self {
        self.required_entities.push(name.into());
        self
    }

    /// Builder: set the dialogue-density band.
    pub fn with_dialogue_band(mut self, min: f64, max: f64) -> Self {
        self.dialogue_band = Some((min, max));
        self
    }

    /// Builder: set the preceding context.
    pub fn with_previous_context(mut self, text: impl Into<String>) -> Self {
        self.previous_context = Some(text.into());
        self
    }
}
