//! Prompt assembly under a token budget.
//!
//! Modules are packed in priority order; whatever does not fit is
//! compressed (when allowed) or omitted. Must-have content is never
//! dropped: when it cannot fit, it is force-compressed to a fraction of
//! the total budget, the one case where the assembled prompt may exceed
//! its budget.
//!
//! Packing is a pure function of the module list and the budget; the same
//! inputs always produce the same prompt.

use crate::text::{content_digest, is_key_point_line, split_sentences, truncate_chars};
use plume_core::models::prompt::{
    estimate_units, CompressionKind, ModuleOutcome, ModulePriority, ModuleStatus, PackedPrompt,
    PromptModule,
};
use tracing::debug;

/// Below this compression target, content is replaced by a digest
/// placeholder instead of summarized.
const PLACEHOLDER_CUTOFF: u32 = 10;

/// Targets at or above this fraction of the original size use leading
/// sentences; smaller targets extract key-point lines.
const LEADING_FRACTION: f64 = 0.30;

/// Approximate characters per budget unit, the inverse of the size
/// estimator.
const CHARS_PER_UNIT: usize = 4;

/// Assembles prompt modules into a budgeted prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptPacker;

impl PromptPacker {
    /// Create a packer.
    pub fn new() -> Self {
        Self
    }

    /// Pack modules into a single prompt under `budget` units.
    pub fn pack(&self, modules: &[PromptModule], budget: u32) -> PackedPrompt {
        let mut ordered: Vec<&PromptModule> = modules.iter().collect();
        // Stable sort keeps the supplied order within each tier.
        ordered.sort_by_key(|m| m.priority);

        let mut running: u32 = 0;
        let mut pieces: Vec<String> = Vec::new();
        let mut outcomes: Vec<ModuleOutcome> = Vec::new();

        for module in ordered {
            let remaining = budget.saturating_sub(running);

            if module.estimated_size <= remaining {
                running += module.estimated_size;
                pieces.push(module.content.clone());
                outcomes.push(ModuleOutcome {
                    id: module.id.clone(),
                    status: ModuleStatus::Included,
                    compression: None,
                    original_size: module.estimated_size,
                    final_size: module.estimated_size,
                });
                continue;
            }

            if module.priority == ModulePriority::MustHave {
                // Forced compression to at most 20% of the total budget.
                // The running total may exceed the budget here; must-have
                // content is never silently dropped.
                let floor = (budget / 5).max(1);
                if module.estimated_size <= floor {
                    running += module.estimated_size;
                    pieces.push(module.content.clone());
                    outcomes.push(ModuleOutcome {
                        id: module.id.clone(),
                        status: ModuleStatus::Included,
                        compression: None,
                        original_size: module.estimated_size,
                        final_size: module.estimated_size,
                    });
                } else {
                    let (text, kind) = compress(&module.content, floor)
                        .unwrap_or_else(|| (String::new(), CompressionKind::Placeholder));
                    let final_size = estimate_units(&text);
                    debug!(
                        module_id = %module.id,
                        original_size = module.estimated_size,
                        final_size,
                        "must-have module force-compressed"
                    );
                    running += final_size;
                    pieces.push(text);
                    outcomes.push(ModuleOutcome {
                        id: module.id.clone(),
                        status: ModuleStatus::Compressed,
                        compression: Some(kind),
                        original_size: module.estimated_size,
                        final_size,
                    });
                }
                continue;
            }

            if module.compressible && remaining > 0 {
                if let Some((text, kind)) = compress(&module.content, remaining) {
                    let final_size = estimate_units(&text);
                    if final_size > 0 && final_size <= remaining {
                        running += final_size;
                        pieces.push(text);
                        outcomes.push(ModuleOutcome {
                            id: module.id.clone(),
                            status: ModuleStatus::Compressed,
                            compression: Some(kind),
                            original_size: module.estimated_size,
                            final_size,
                        });
                        continue;
                    }
                }
            }

            outcomes.push(ModuleOutcome {
                id: module.id.clone(),
                status: ModuleStatus::Omitted,
                compression: None,
                original_size: module.estimated_size,
                final_size: 0,
            });
        }

        let text = pieces
            .iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<&str>>()
            .join("\n\n");

        let budget_fraction = if budget == 0 {
            0.0
        } else {
            f64::from(running) / f64::from(budget)
        };

        PackedPrompt {
            signature: content_digest(&text),
            text,
            outcomes,
            total_size: running,
            budget_fraction,
        }
    }
}

/// Compress content to fit a target size in budget units.
///
/// Returns `None` when nothing meaningful fits. The result never exceeds
/// the target, and never exceeds the original content's size.
fn compress(content: &str, target: u32) -> Option<(String, CompressionKind)> {
    if target == 0 {
        return None;
    }

    let original_units = estimate_units(content);
    let max_chars = (target as usize * CHARS_PER_UNIT).min(content.chars().count());

    let (mut text, kind) = if target < PLACEHOLDER_CUTOFF {
        (
            format!("[ref:{}]", &content_digest(content)[..8]),
            CompressionKind::Placeholder,
        )
    } else if f64::from(target) >= LEADING_FRACTION * f64::from(original_units) {
        (leading_sentences(content, target), CompressionKind::LeadingSentences)
    } else {
        (key_point_lines(content, target), CompressionKind::KeyPoints)
    };

    if text.is_empty() || estimate_units(&text) > target {
        // Short-prefix fallback, hard-clamped to the target.
        text = truncate_chars(content, max_chars).trim_end().to_string();
    }
    if text.chars().count() > max_chars {
        text = truncate_chars(&text, max_chars).trim_end().to_string();
    }

    if text.trim().is_empty() {
        None
    } else {
        Some((text, kind))
    }
}

/// Keep leading sentences until the target is reached.
fn leading_sentences(content: &str, target: u32) -> String {
    let mut kept = String::new();
    for sentence in split_sentences(content) {
        let candidate = if kept.is_empty() {
            sentence.to_string()
        } else {
            format!("{} {}", kept, sentence)
        };
        if estimate_units(&candidate) > target {
            break;
        }
        kept = candidate;
    }
    kept
}

/// Extract key-point lines (colon, enumerator, bullet) up to the target.
fn key_point_lines(content: &str, target: u32) -> String {
    let mut kept = String::new();
    for line in content.lines().map(str::trim).filter(|l| is_key_point_line(l)) {
        let candidate = if kept.is_empty() {
            line.to_string()
        } else {
            format!("{}\n{}", kept, line)
        };
        if estimate_units(&candidate) > target {
            break;
        }
        kept = candidate;
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::models::prompt::ModulePriority::{Important, MustHave, Optional};
    use proptest::prelude::*;

    fn module(id: &str, priority: ModulePriority, units: u32) -> PromptModule {
        // Content sized so the estimator agrees with `units`.
        PromptModule::new(id, priority, "x".repeat(units as usize * 4))
    }

    fn prose_module(id: &str, priority: ModulePriority, sentences: usize) -> PromptModule {
        let content = (0..sentences)
            .map(|i| format!("Sentence number {} walks along the pier.", i))
            .collect::<Vec<_>>()
            .join(" ");
        PromptModule::new(id, priority, content)
    }

    #[test]
    fn test_everything_fits() {
        let packer = PromptPacker::new();
        let modules = vec![
            module("a", MustHave, 10),
            module("b", Important, 10),
            module("c", Optional, 10),
        ];

        let packed = packer.pack(&modules, 100);
        assert_eq!(packed.total_size, 30);
        assert!(packed.budget_fraction <= 1.0);
        for outcome in &packed.outcomes {
            assert_eq!(outcome.status, ModuleStatus::Included);
        }
    }

    #[test]
    fn test_priority_order_in_text() {
        let packer = PromptPacker::new();
        let modules = vec![
            PromptModule::new("opt", Optional, "optional text"),
            PromptModule::new("must", MustHave, "must text"),
            PromptModule::new("imp", Important, "important text"),
        ];

        let packed = packer.pack(&modules, 1000);
        let must_pos = packed.text.find("must text").unwrap();
        let imp_pos = packed.text.find("important text").unwrap();
        let opt_pos = packed.text.find("optional text").unwrap();
        assert!(must_pos < imp_pos);
        assert!(imp_pos < opt_pos);
    }

    #[test]
    fn test_optional_omitted_when_not_compressible() {
        let packer = PromptPacker::new();
        let modules = vec![
            module("a", MustHave, 50),
            module("b", Optional, 80).not_compressible(),
        ];

        let packed = packer.pack(&modules, 60);
        assert_eq!(packed.outcome("a").unwrap().status, ModuleStatus::Included);
        assert_eq!(packed.outcome("b").unwrap().status, ModuleStatus::Omitted);
        assert!(packed.total_size <= 60);
    }

    #[test]
    fn test_must_have_force_compressed() {
        // A 500-unit must-have module against a budget of 100 compresses
        // to at most 20 units and is never omitted.
        let packer = PromptPacker::new();
        let modules = vec![prose_module("big", MustHave, 180)];
        assert!(modules[0].estimated_size >= 500);

        let packed = packer.pack(&modules, 100);
        let outcome = packed.outcome("big").unwrap();
        assert_eq!(outcome.status, ModuleStatus::Compressed);
        assert!(outcome.final_size <= 20);
        assert!(outcome.final_size > 0);
    }

    #[test]
    fn test_compressible_module_summarized() {
        let packer = PromptPacker::new();
        let modules = vec![
            module("a", MustHave, 40),
            prose_module("b", Important, 40),
        ];

        let packed = packer.pack(&modules, 60);
        let outcome = packed.outcome("b").unwrap();
        assert_eq!(outcome.status, ModuleStatus::Compressed);
        assert!(outcome.final_size <= 20);
        assert!(packed.total_size <= 60);
    }

    #[test]
    fn test_tiny_target_uses_placeholder() {
        let compressed = compress(&"x".repeat(400), 5).unwrap();
        assert_eq!(compressed.1, CompressionKind::Placeholder);
        assert!(estimate_units(&compressed.0) <= 5);
    }

    #[test]
    fn test_moderate_target_keeps_leading_sentences() {
        let content = "The first sentence settles the scene by the water. \
                       The second sentence introduces the keeper of the light. \
                       The third sentence brings the storm in from the west. \
                       The fourth sentence closes the shutters one by one. \
                       The fifth sentence waits out the night.";
        let units = estimate_units(content);
        let target = units / 2;
        assert!(target >= PLACEHOLDER_CUTOFF);

        let (text, kind) = compress(content, target).unwrap();
        assert_eq!(kind, CompressionKind::LeadingSentences);
        assert!(text.starts_with("The first sentence settles the scene by the water."));
        assert!(estimate_units(&text) <= target);
    }

    #[test]
    fn test_aggressive_target_extracts_key_points() {
        let content = "The lighthouse keeper's log spans decades of entries about storms, \
                       ships, and the slow erosion of the cliff face beneath the tower.\n\
                       keeper: Edmund Hale\n\
                       - tower height: 40m\n\
                       1. first lit in 1872\n"
            .repeat(4);
        let units = estimate_units(&content);
        let target = (f64::from(units) * 0.15) as u32;
        assert!(target >= PLACEHOLDER_CUTOFF);

        let (text, kind) = compress(&content, target).unwrap();
        assert_eq!(kind, CompressionKind::KeyPoints);
        assert!(text.contains(':') || text.starts_with('-') || text.starts_with('1'));
        assert!(estimate_units(&text) <= target);
    }

    #[test]
    fn test_key_points_fallback_to_prefix() {
        // No key-point lines at all: falls back to a prefix.
        let content = "Plain prose without any structure markers whatsoever ".repeat(20);
        let units = estimate_units(&content);
        let target = (f64::from(units) * 0.15) as u32;
        assert!(target >= PLACEHOLDER_CUTOFF);

        let (text, _) = compress(&content, target).unwrap();
        assert!(!text.is_empty());
        assert!(estimate_units(&text) <= target);
        assert!(content.starts_with(text.trim_end()));
    }

    #[test]
    fn test_signature_deterministic() {
        let packer = PromptPacker::new();
        let modules = vec![prose_module("a", MustHave, 10)];

        let first = packer.pack(&modules, 100);
        let second = packer.pack(&modules, 100);
        assert_eq!(first.signature, second.signature);
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn test_zero_budget() {
        let packer = PromptPacker::new();
        let modules = vec![module("a", MustHave, 10), module("b", Optional, 10)];

        let packed = packer.pack(&modules, 0);
        // Must-have survives via forced compression; optional is dropped.
        assert_eq!(packed.outcome("a").unwrap().status, ModuleStatus::Compressed);
        assert_eq!(packed.outcome("b").unwrap().status, ModuleStatus::Omitted);
    }

    proptest! {
        #[test]
        fn prop_must_have_never_omitted(
            sizes in prop::collection::vec((0u8..3, 1u32..60), 1..8),
            budget in 1u32..200,
        ) {
            let modules: Vec<PromptModule> = sizes
                .iter()
                .enumerate()
                .map(|(i, (tier, units))| {
                    let priority = match tier {
                        0 => MustHave,
                        1 => Important,
                        _ => Optional,
                    };
                    module(&format!("m{}", i), priority, *units)
                })
                .collect();

            let packed = PromptPacker::new().pack(&modules, budget);
            for module in &modules {
                if module.priority == MustHave {
                    let outcome = packed.outcome(&module.id).unwrap();
                    prop_assert_ne!(outcome.status, ModuleStatus::Omitted);
                }
            }
        }

        #[test]
        fn prop_total_within_budget_without_forced_compression(
            sizes in prop::collection::vec((0u8..3, 1u32..60), 1..8),
            budget in 1u32..200,
        ) {
            let modules: Vec<PromptModule> = sizes
                .iter()
                .enumerate()
                .map(|(i, (tier, units))| {
                    let priority = match tier {
                        0 => MustHave,
                        1 => Important,
                        _ => Optional,
                    };
                    module(&format!("m{}", i), priority, *units)
                })
                .collect();

            let packed = PromptPacker::new().pack(&modules, budget);
            let forced = modules.iter().any(|m| {
                m.priority == MustHave
                    && packed.outcome(&m.id).map(|o| o.status) == Some(ModuleStatus::Compressed)
            });
            let must_have_overrun = modules.iter().any(|m| {
                m.priority == MustHave
                    && packed.outcome(&m.id).map(|o| o.status) == Some(ModuleStatus::Included)
                    && packed.total_size > budget
            });
            if !forced && !must_have_overrun {
                prop_assert!(packed.total_size <= budget);
            }
        }

        #[test]
        fn prop_compression_never_grows(
            sizes in prop::collection::vec((0u8..3, 1u32..60), 1..8),
            budget in 1u32..200,
        ) {
            let modules: Vec<PromptModule> = sizes
                .iter()
                .enumerate()
                .map(|(i, (tier, units))| {
                    let priority = match tier {
                        0 => MustHave,
                        1 => Important,
                        _ => Optional,
                    };
                    module(&format!("m{}", i), priority, *units)
                })
                .collect();

            let packed = PromptPacker::new().pack(&modules, budget);
            for outcome in &packed.outcomes {
                prop_assert!(outcome.final_size <= outcome.original_size);
            }
        }
    }
}
