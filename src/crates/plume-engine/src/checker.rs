//! Deterministic quality gating for generated content.
//!
//! Runs on every generation, cached or not, so the deterministic battery
//! has to stay well under 100ms: plain string scans, one bounded
//! edit-distance pass, no backend calls. An optional semantic pass
//! ([`RuleChecker::check_semantic`]) delegates to a backend and is skipped
//! by default in latency-sensitive flows.
//!
//! Scoring starts at 100 and deducts 20 per error and 10 per warning,
//! floored at 0; the check passes iff no error-severity violations were
//! found. Violations repairable by editing the content (meta-commentary
//! removal, de-duplication, paragraph splitting, name normalization) are
//! flagged auto-fixable; length and missing-entity problems are not,
//! since fixing those means regenerating.

use crate::parse::parse_structured;
use crate::text::{
    count_occurrences, dialogue_ratio, edit_similarity, split_paragraphs, split_sentences,
    truncate_chars,
};
use plume_core::config::CheckerSettings;
use plume_core::models::generation::GenerationParams;
use plume_core::models::rules::{CheckConstraints, RuleCheckResult, RuleViolation};
use plume_core::traits::TextBackend;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Rule identifiers.
pub mod rules {
    pub const LENGTH_CRITICALLY_SHORT: &str = "length.critically_short";
    pub const LENGTH_SHORT: &str = "length.short";
    pub const LENGTH_LONG: &str = "length.long";
    pub const ENTITY_MISSING: &str = "entity.missing";
    pub const META_COMMENTARY: &str = "meta.commentary";
    pub const DIALOGUE_DENSITY: &str = "dialogue.density";
    pub const PARAGRAPH_COUNT: &str = "structure.paragraphs";
    pub const NEAR_DUPLICATE: &str = "repetition.near_duplicate";
    pub const NAMING_INCONSISTENT: &str = "naming.inconsistent";
    pub const CONTINUITY_TIME: &str = "continuity.time";
    pub const CONTINUITY_TRANSITION: &str = "continuity.transition";
}

/// Patterns that read as the generator narrating about itself instead of
/// producing the requested content.
const META_PATTERNS: &[&str] = &[
    r"(?i)\bas an ai\b",
    r"(?i)\bas a language model\b",
    r"(?i)\bi (cannot|can't|am unable to) (write|generate|continue|produce)\b",
    r"(?i)^here (is|'s) (the|your|a)\b",
    r"(?i)\bi hope (this|you)\b",
    r"(?i)\blet me know if\b",
    r"(?i)\[(note|placeholder|tbd|todo)[^\]]*\]",
    r"(?i)\bword count:",
];

/// Day-progression ranks for time-of-day words.
const TIME_WORDS: &[(&str, u8)] = &[
    ("dawn", 0),
    ("morning", 1),
    ("noon", 2),
    ("midday", 2),
    ("afternoon", 3),
    ("dusk", 4),
    ("evening", 5),
    ("night", 6),
    ("midnight", 7),
];

/// Skip sentences shorter than this in the near-duplicate scan.
const DUPLICATE_MIN_CHARS: usize = 20;

/// Cap the near-duplicate scan to the first N qualifying sentences.
const DUPLICATE_MAX_SENTENCES: usize = 120;

/// Content is expected to break into a new paragraph roughly this often.
const CHARS_PER_PARAGRAPH: usize = 1500;

/// Verdict of the optional backend-delegated semantic pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticVerdict {
    /// Internally consistent.
    pub consistent: bool,

    /// The premise can sustain continuation.
    pub sustainable: bool,

    /// Free-form reviewer notes.
    #[serde(default)]
    pub notes: String,
}

/// Deterministic rule checker.
pub struct RuleChecker {
    settings: CheckerSettings,
    meta_patterns: Vec<Regex>,
}

impl RuleChecker {
    /// Create a checker with default settings.
    pub fn new() -> Self {
        Self::with_settings(CheckerSettings::default())
    }

    /// Create a checker with explicit settings.
    pub fn with_settings(settings: CheckerSettings) -> Self {
        let meta_patterns = META_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            settings,
            meta_patterns,
        }
    }

    /// Run the deterministic battery against content.
    pub fn check(&self, content: &str, constraints: &CheckConstraints) -> RuleCheckResult {
        let started = Instant::now();
        let mut violations = Vec::new();

        self.check_length(content, constraints, &mut violations);
        self.check_entities(content, constraints, &mut violations);
        self.check_meta_commentary(content, constraints, &mut violations);
        self.check_dialogue_density(content, constraints, &mut violations);
        self.check_paragraphs(content, &mut violations);
        self.check_near_duplicates(content, &mut violations);
        self.check_naming_variants(content, constraints, &mut violations);
        self.check_continuity(content, constraints, &mut violations);

        RuleCheckResult::from_violations(violations, started.elapsed())
    }

    fn check_length(
        &self,
        content: &str,
        constraints: &CheckConstraints,
        out: &mut Vec<RuleViolation>,
    ) {
        let Some(target) = constraints.target_length else {
            return;
        };
        if target == 0 {
            return;
        }

        let actual = content.chars().count() as f64;
        let ratio = actual / f64::from(target);

        if ratio < 0.5 {
            out.push(RuleViolation::error(
                rules::LENGTH_CRITICALLY_SHORT,
                format!(
                    "content is {:.0}% of the {}-character target",
                    ratio * 100.0,
                    target
                ),
            ));
        } else if ratio < 0.7 {
            out.push(RuleViolation::warning(
                rules::LENGTH_SHORT,
                format!(
                    "content is {:.0}% of the {}-character target",
                    ratio * 100.0,
                    target
                ),
            ));
        } else if ratio > 1.5 {
            out.push(RuleViolation::warning(
                rules::LENGTH_LONG,
                format!(
                    "content is {:.0}% of the {}-character target",
                    ratio * 100.0,
                    target
                ),
            ));
        }
    }

    fn check_entities(
        &self,
        content: &str,
        constraints: &CheckConstraints,
        out: &mut Vec<RuleViolation>,
    ) {
        for entity in &constraints.required_entities {
            if !content.contains(entity.as_str()) {
                out.push(RuleViolation::error(
                    rules::ENTITY_MISSING,
                    format!("required entity '{}' does not appear", entity),
                ));
            }
        }
    }

    fn check_meta_commentary(
        &self,
        content: &str,
        constraints: &CheckConstraints,
        out: &mut Vec<RuleViolation>,
    ) {
        for pattern in &self.meta_patterns {
            if let Some(found) = pattern.find(content) {
                out.push(
                    RuleViolation::error(
                        rules::META_COMMENTARY,
                        format!("meta-commentary found: '{}'", found.as_str()),
                    )
                    .auto_fixable(),
                );
            }
        }

        for source in &constraints.extra_forbidden {
            match Regex::new(source) {
                Ok(pattern) => {
                    if let Some(found) = pattern.find(content) {
                        out.push(
                            RuleViolation::error(
                                rules::META_COMMENTARY,
                                format!("forbidden pattern found: '{}'", found.as_str()),
                            )
                            .auto_fixable(),
                        );
                    }
                }
                Err(e) => debug!(pattern = %source, error = %e, "skipping invalid forbidden pattern"),
            }
        }
    }

    fn check_dialogue_density(
        &self,
        content: &str,
        constraints: &CheckConstraints,
        out: &mut Vec<RuleViolation>,
    ) {
        let sentences = split_sentences(content);
        if sentences.len() < 5 {
            return;
        }

        let (min, max) = constraints
            .dialogue_band
            .unwrap_or(self.settings.default_dialogue_band);
        let ratio = dialogue_ratio(&sentences);

        if ratio < min || ratio > max {
            out.push(RuleViolation::warning(
                rules::DIALOGUE_DENSITY,
                format!(
                    "dialogue density {:.2} outside the acceptable band [{:.2}, {:.2}]",
                    ratio, min, max
                ),
            ));
        }
    }

    fn check_paragraphs(&self, content: &str, out: &mut Vec<RuleViolation>) {
        let expected_min = content.chars().count() / CHARS_PER_PARAGRAPH;
        if expected_min < 2 {
            return;
        }

        let actual = split_paragraphs(content).len();
        if actual < expected_min {
            out.push(RuleViolation::warning(
                rules::PARAGRAPH_COUNT,
                format!(
                    "{} paragraph(s) for content that should break into at least {}",
                    actual, expected_min
                ),
            ));
        }
    }

    fn check_near_duplicates(&self, content: &str, out: &mut Vec<RuleViolation>) {
        let sentences: Vec<&str> = split_sentences(content)
            .into_iter()
            .filter(|s| s.chars().count() >= DUPLICATE_MIN_CHARS)
            .take(DUPLICATE_MAX_SENTENCES)
            .collect();

        for i in 0..sentences.len() {
            for j in (i + 1)..sentences.len() {
                let (a, b) = (sentences[i], sentences[j]);
                // Cheap length pre-filter before the quadratic distance.
                let (la, lb) = (a.chars().count(), b.chars().count());
                if la * 2 < lb || lb * 2 < la {
                    continue;
                }
                if edit_similarity(a, b) > self.settings.near_duplicate_threshold {
                    out.push(
                        RuleViolation::warning(
                            rules::NEAR_DUPLICATE,
                            format!("near-duplicate sentences: '{}'", truncate_chars(a, 60)),
                        )
                        .auto_fixable(),
                    );
                    return;
                }
            }
        }
    }

    fn check_naming_variants(
        &self,
        content: &str,
        constraints: &CheckConstraints,
        out: &mut Vec<RuleViolation>,
    ) {
        for entity in &constraints.required_entities {
            let parts: Vec<&str> = entity
                .split_whitespace()
                .filter(|p| p.chars().count() >= 3)
                .collect();
            if parts.len() < 2 {
                continue;
            }

            let full = count_occurrences(content, entity);
            let partial: usize = parts
                .iter()
                .map(|part| count_occurrences(content, part).saturating_sub(full))
                .sum();

            if partial > self.settings.naming_variant_limit {
                out.push(
                    RuleViolation::warning(
                        rules::NAMING_INCONSISTENT,
                        format!(
                            "'{}' appears in {} partial-name variants alongside {} full uses",
                            entity, partial, full
                        ),
                    )
                    .auto_fixable(),
                );
            }
        }
    }

    fn check_continuity(
        &self,
        content: &str,
        constraints: &CheckConstraints,
        out: &mut Vec<RuleViolation>,
    ) {
        if let Some(previous) = &constraints.previous_context {
            if let Some((word, rank)) = last_time_word(previous) {
                if let Some((anchor, anchor_rank)) = same_day_anchor(content) {
                    if anchor_rank < rank {
                        out.push(RuleViolation::warning(
                            rules::CONTINUITY_TIME,
                            format!(
                                "content anchors to '{}' but the preceding context already reached '{}'",
                                anchor, word
                            ),
                        ));
                    }
                }
            }
        }

        if constraints.next_context.is_some() {
            let trimmed = content.trim_end();
            if trimmed.ends_with('\u{2014}')
                || trimmed.ends_with("...")
                || trimmed.ends_with('\u{2026}')
            {
                out.push(RuleViolation::info(
                    rules::CONTINUITY_TRANSITION,
                    "unit ends on an unresolved transition before adjoining content".to_string(),
                ));
            }
        }
    }

    /// Optional semantic pass: consistency and premise sustainability.
    ///
    /// Delegates to a backend with a small fixed-shape prompt. Any failure
    /// (call, parse) degrades to `None`; the pass is skipped, never
    /// fatal.
    pub async fn check_semantic(
        &self,
        content: &str,
        backend: &dyn TextBackend,
    ) -> Option<SemanticVerdict> {
        let prompt = format!(
            "Review the passage below for internal consistency and whether its \
             premise can sustain continuation.\n\
             Respond with JSON: {{\"consistent\": bool, \"sustainable\": bool, \"notes\": string}}\n\n\
             Passage:\n{}",
            truncate_chars(content, 2000),
        );
        let params = GenerationParams::default()
            .with_temperature(0.0)
            .with_max_output_size(256);

        match backend.generate(&prompt, &params).await {
            Ok(response) => match parse_structured::<SemanticVerdict>(&response.content).into_value()
            {
                Some(verdict) => Some(verdict),
                None => {
                    debug!("semantic validation reply unparseable, skipping");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "semantic validation unavailable, skipping");
                None
            }
        }
    }
}

impl Default for RuleChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Last time-of-day word in a text, with its rank.
fn last_time_word(text: &str) -> Option<(&'static str, u8)> {
    let lower = text.to_lowercase();
    TIME_WORDS
        .iter()
        .filter_map(|&(word, rank)| lower.rfind(word).map(|pos| (pos, word, rank)))
        .max_by_key(|(pos, _, _)| *pos)
        .map(|(_, word, rank)| (word, rank))
}

/// A same-day time anchor in content: "that <time>" or "the same <time>".
fn same_day_anchor(content: &str) -> Option<(&'static str, u8)> {
    let lower = content.to_lowercase();
    for &(word, rank) in TIME_WORDS {
        if lower.contains(&format!("that {}", word))
            || lower.contains(&format!("the same {}", word))
        {
            return Some((word, rank));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::models::rules::Severity;
    use plume_core::testing::{ScriptedBackend, ScriptedReply};

    fn checker() -> RuleChecker {
        RuleChecker::new()
    }

    fn clean_passage() -> String {
        "Mara Voss stood at the end of the pier and watched the ferry lights. \
         The harbor smelled of rope and diesel. \
         \"You came back,\" said the keeper. \
         \"I always do,\" Mara answered, pulling her coat tighter. \
         Gulls wheeled over the breakwater as the last light failed."
            .to_string()
    }

    #[test]
    fn test_clean_content_scores_100() {
        let result = checker().check(&clean_passage(), &CheckConstraints::new());
        assert!(result.passed);
        assert_eq!(result.score, 100);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_missing_entity_is_error() {
        let constraints = CheckConstraints::new()
            .with_required_entity("Mara Voss")
            .with_required_entity("Edmund");

        let result = checker().check(&clean_passage(), &constraints);
        assert!(!result.passed);
        assert_eq!(result.score, 80);
        let violation = &result.violations[0];
        assert_eq!(violation.rule, rules::ENTITY_MISSING);
        assert!(!violation.auto_fixable);
        assert!(violation.message.contains("Edmund"));
    }

    #[test]
    fn test_length_bands() {
        let content = "x".repeat(400);

        // 400 of 1000 -> below 50% -> error
        let result = checker().check(
            &content,
            &CheckConstraints::new().with_target_length(1000),
        );
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::LENGTH_CRITICALLY_SHORT && v.severity == Severity::Error));

        // 400 of 650 -> ~62% -> warning
        let result = checker().check(
            &content,
            &CheckConstraints::new().with_target_length(650),
        );
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::LENGTH_SHORT && v.severity == Severity::Warning));
        assert!(result.passed);

        // 400 of 200 -> 200% -> warning
        let result = checker().check(
            &content,
            &CheckConstraints::new().with_target_length(200),
        );
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::LENGTH_LONG && v.severity == Severity::Warning));

        // 400 of 400 -> no violation
        let result = checker().check(
            &content,
            &CheckConstraints::new().with_target_length(400),
        );
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_meta_commentary_flagged_auto_fixable() {
        let content = "Here is the scene you requested. Mara walked to the pier.";
        let result = checker().check(content, &CheckConstraints::new());

        let violation = result
            .violations
            .iter()
            .find(|v| v.rule == rules::META_COMMENTARY)
            .expect("meta commentary should be flagged");
        assert_eq!(violation.severity, Severity::Error);
        assert!(violation.auto_fixable);
    }

    #[test]
    fn test_extra_forbidden_patterns() {
        let constraints = CheckConstraints {
            extra_forbidden: vec![r"(?i)\bchapter \d+ recap\b".to_string()],
            ..CheckConstraints::default()
        };

        let result = checker().check("A quick Chapter 3 recap before we begin.", &constraints);
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::META_COMMENTARY));
    }

    #[test]
    fn test_invalid_extra_pattern_skipped() {
        let constraints = CheckConstraints {
            extra_forbidden: vec!["[unclosed".to_string()],
            ..CheckConstraints::default()
        };

        // Must not panic or flag anything.
        let result = checker().check(&clean_passage(), &constraints);
        assert!(result.passed);
    }

    #[test]
    fn test_dialogue_density_band() {
        // Six sentences, zero dialogue, band requires at least 30%.
        let content = "One walks. Two walks. Three walks. Four walks. Five walks. Six walks.";
        let constraints = CheckConstraints::new().with_dialogue_band(0.3, 0.8);

        let result = checker().check(content, &constraints);
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::DIALOGUE_DENSITY));

        // Short content is exempt.
        let result = checker().check("One walks. Two walks.", &constraints);
        assert!(!result
            .violations
            .iter()
            .any(|v| v.rule == rules::DIALOGUE_DENSITY));
    }

    #[test]
    fn test_paragraph_count() {
        // ~3200 chars in a single paragraph: expects at least 2.
        let content = "The tide carried the last of the day out past the mole. ".repeat(56);
        let result = checker().check(&content, &CheckConstraints::new());
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::PARAGRAPH_COUNT));

        // Same length split into paragraphs passes.
        let half = "The tide carried the last of the day out past the mole. ".repeat(28);
        let split = format!("{}\n\n{}", half, half);
        let result = checker().check(&split, &CheckConstraints::new());
        assert!(!result
            .violations
            .iter()
            .any(|v| v.rule == rules::PARAGRAPH_COUNT));
    }

    #[test]
    fn test_near_duplicate_sentences() {
        let content = "The keeper climbed the spiral stair to the lamp room. \
                       Some time passed in the dark below. \
                       The keeper climbed the spiral stair to the lamp rooms.";
        let result = checker().check(content, &CheckConstraints::new());

        let violation = result
            .violations
            .iter()
            .find(|v| v.rule == rules::NEAR_DUPLICATE)
            .expect("near duplicates should be flagged");
        assert!(violation.auto_fixable);
    }

    #[test]
    fn test_naming_variants() {
        // "Mara" alone appears many times against one full "Mara Voss".
        let content = "Mara Voss docked at dusk. Mara tied the line. Mara checked the nets. \
                       Mara lit the stove. Mara slept. Mara woke before dawn.";
        let constraints = CheckConstraints::new().with_required_entity("Mara Voss");

        let result = checker().check(content, &constraints);
        let violation = result
            .violations
            .iter()
            .find(|v| v.rule == rules::NAMING_INCONSISTENT)
            .expect("naming variants should be flagged");
        assert!(violation.auto_fixable);
    }

    #[test]
    fn test_continuity_time_contradiction() {
        let constraints = CheckConstraints::new()
            .with_previous_context("They argued until night fell over the harbor.");

        let content = "Later, that morning, Mara refused to speak of it.";
        let result = checker().check(content, &constraints);
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == rules::CONTINUITY_TIME));

        // Forward progression is fine.
        let content = "That night, Mara refused to speak of it.";
        let result = checker().check(content, &constraints);
        assert!(!result
            .violations
            .iter()
            .any(|v| v.rule == rules::CONTINUITY_TIME));
    }

    #[test]
    fn test_continuity_dangling_transition() {
        let constraints = CheckConstraints {
            next_context: Some("The next scene picks up at the market.".to_string()),
            ..CheckConstraints::default()
        };

        let result = checker().check("She reached for the door and...", &constraints);
        let violation = result
            .violations
            .iter()
            .find(|v| v.rule == rules::CONTINUITY_TRANSITION)
            .expect("dangling transition should be noted");
        assert_eq!(violation.severity, Severity::Info);
        // Info-only: score unaffected.
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_checker_is_fast() {
        let content = clean_passage().repeat(40);
        let constraints = CheckConstraints::new()
            .with_target_length(10_000)
            .with_required_entity("Mara Voss");

        let result = checker().check(&content, &constraints);
        assert!(result.execution_time_ms < 100);
    }

    #[tokio::test]
    async fn test_semantic_pass_parses_verdict() {
        let backend = ScriptedBackend::always(
            "reviewer",
            r#"{"consistent": true, "sustainable": false, "notes": "premise thins out"}"#,
        );

        let verdict = checker()
            .check_semantic(&clean_passage(), &backend)
            .await
            .expect("verdict expected");
        assert!(verdict.consistent);
        assert!(!verdict.sustainable);
    }

    #[tokio::test]
    async fn test_semantic_pass_degrades_to_skip() {
        let failing = ScriptedBackend::with_script(
            "reviewer",
            vec![ScriptedReply::Error("offline".to_string())],
        );
        assert!(checker()
            .check_semantic(&clean_passage(), &failing)
            .await
            .is_none());

        let garbled = ScriptedBackend::always("reviewer", "not json at all");
        assert!(checker()
            .check_semantic(&clean_passage(), &garbled)
            .await
            .is_none());
    }
}
