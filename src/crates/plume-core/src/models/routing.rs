//! Routing signals, backend descriptors, and routing decisions.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Normalized difficulty/cost signals for a generation request.
///
/// All four values live in `[0, 1]`; the constructor clamps out-of-range
/// input rather than failing, since the signals are heuristic to begin
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingSignals {
    /// Higher means the task is easy and well understood.
    pub confidence: f64,

    /// Density of conflicting constraints in the request.
    pub conflict_density: f64,

    /// Structural complexity of the requested content.
    pub complexity: f64,

    /// Higher means more cost headroom.
    pub budget_factor: f64,
}

impl RoutingSignals {
    /// Create signals, clamping each value into `[0, 1]`.
    pub fn new(confidence: f64, conflict_density: f64, complexity: f64, budget_factor: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            conflict_density: conflict_density.clamp(0.0, 1.0),
            complexity: complexity.clamp(0.0, 1.0),
            budget_factor: budget_factor.clamp(0.0, 1.0),
        }
    }
}

impl Default for RoutingSignals {
    fn default() -> Self {
        Self::new(0.5, 0.0, 0.5, 0.5)
    }
}

/// Coarse quality/cost classification of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    /// Cheap, lower-quality backend.
    Low,
    /// Expensive, higher-quality backend.
    High,
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Description of an available generation backend.
///
/// Supplied by the execution store; read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Backend identifier, matching a registered client.
    pub id: String,

    /// Capability tier.
    pub tier: CapabilityTier,

    /// Whether the backend may currently be selected.
    pub is_active: bool,

    /// Whether this backend is the designated default for its tier.
    pub is_default_for_tier: bool,
}

impl BackendDescriptor {
    /// Create an active, non-default descriptor.
    pub fn new(id: impl Into<String>, tier: CapabilityTier) -> Self {
        Self {
            id: id.into(),
            tier,
            is_active: true,
            is_default_for_tier: false,
        }
    }

    /// Builder: mark as the designated default for its tier.
    pub fn as_tier_default(mut self) -> Self {
        self.is_default_for_tier = true;
        self
    }

    /// Builder: set the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }
}

/// Routing strategy selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Cheap backend only.
    Small,
    /// Cheap primary with a high-capability fallback.
    SmallWithFallback,
    /// High-capability backend, no fallback.
    Big,
}

impl std::fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::SmallWithFallback => write!(f, "small_with_fallback"),
            Self::Big => write!(f, "big"),
        }
    }
}

/// Outcome of backend routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected strategy.
    pub strategy: RoutingStrategy,

    /// Primary backend id.
    pub primary: String,

    /// Fallback backend id, when the strategy carries one.
    pub fallback: Option<String>,

    /// The computed routing scalar.
    pub score: f64,

    /// Human-readable justification.
    pub reasoning: String,
}

/// Discrete task intent for the a-priori routing variant.
///
/// Used when task difficulty is known up front instead of computed from
/// signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskIntent {
    /// Fast exploratory draft; quality is secondary.
    RoughDraft,
    /// Structural outline work.
    Outline,
    /// Revision of existing content.
    Revision,
    /// Last pass before the content is surfaced.
    FinalPolish,
    /// Embedding-adjacent utility call.
    Embedding,
}

impl TaskIntent {
    /// Static intent-to-tier lookup.
    pub fn required_tier(&self) -> CapabilityTier {
        match self {
            TaskIntent::RoughDraft | TaskIntent::Outline | TaskIntent::Embedding => {
                CapabilityTier::Low
            }
            TaskIntent::Revision | TaskIntent::FinalPolish => CapabilityTier::High,
        }
    }
}

impl std::fmt::Display for TaskIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoughDraft => write!(f, "rough_draft"),
            Self::Outline => write!(f, "outline"),
            Self::Revision => write!(f, "revision"),
            Self::FinalPolish => write!(f, "final_polish"),
            Self::Embedding => write!(f, "embedding"),
        }
    }
}

/// Select a backend id for a tier from a descriptor list.
///
/// Preference order: the designated default of the tier, then the first
/// active tier match, then any designated default, then the first active
/// backend. Fails only when nothing is active at all.
pub fn select_for_tier(backends: &[BackendDescriptor], tier: CapabilityTier) -> Result<String> {
    let active: Vec<&BackendDescriptor> = backends.iter().filter(|b| b.is_active).collect();
    if active.is_empty() {
        return Err(EngineError::NoBackendAvailable(
            "no active backend registered".to_string(),
        ));
    }

    let pick = active
        .iter()
        .find(|b| b.tier == tier && b.is_default_for_tier)
        .or_else(|| active.iter().find(|b| b.tier == tier))
        .or_else(|| active.iter().find(|b| b.is_default_for_tier))
        .unwrap_or(&active[0]);

    Ok(pick.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_clamped() {
        let signals = RoutingSignals::new(1.5, -0.2, 0.4, 2.0);
        assert_eq!(signals.confidence, 1.0);
        assert_eq!(signals.conflict_density, 0.0);
        assert_eq!(signals.complexity, 0.4);
        assert_eq!(signals.budget_factor, 1.0);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(RoutingStrategy::Small.to_string(), "small");
        assert_eq!(
            RoutingStrategy::SmallWithFallback.to_string(),
            "small_with_fallback"
        );
        assert_eq!(RoutingStrategy::Big.to_string(), "big");
    }

    #[test]
    fn test_intent_tier_table() {
        assert_eq!(TaskIntent::RoughDraft.required_tier(), CapabilityTier::Low);
        assert_eq!(TaskIntent::Outline.required_tier(), CapabilityTier::Low);
        assert_eq!(TaskIntent::Embedding.required_tier(), CapabilityTier::Low);
        assert_eq!(TaskIntent::Revision.required_tier(), CapabilityTier::High);
        assert_eq!(TaskIntent::FinalPolish.required_tier(), CapabilityTier::High);
    }

    #[test]
    fn test_select_prefers_tier_default() {
        let backends = vec![
            BackendDescriptor::new("cheap-a", CapabilityTier::Low),
            BackendDescriptor::new("cheap-b", CapabilityTier::Low).as_tier_default(),
            BackendDescriptor::new("big-a", CapabilityTier::High),
        ];

        assert_eq!(
            select_for_tier(&backends, CapabilityTier::Low).unwrap(),
            "cheap-b"
        );
        assert_eq!(
            select_for_tier(&backends, CapabilityTier::High).unwrap(),
            "big-a"
        );
    }

    #[test]
    fn test_select_falls_back_to_global_default() {
        let backends = vec![
            BackendDescriptor::new("cheap-a", CapabilityTier::Low),
            BackendDescriptor::new("cheap-b", CapabilityTier::Low).as_tier_default(),
        ];

        // No high-tier backend exists; the designated default wins.
        assert_eq!(
            select_for_tier(&backends, CapabilityTier::High).unwrap(),
            "cheap-b"
        );
    }

    #[test]
    fn test_select_skips_inactive() {
        let backends = vec![
            BackendDescriptor::new("cheap-a", CapabilityTier::Low).with_active(false),
            BackendDescriptor::new("cheap-b", CapabilityTier::Low),
        ];

        assert_eq!(
            select_for_tier(&backends, CapabilityTier::Low).unwrap(),
            "cheap-b"
        );
    }

    #[test]
    fn test_select_no_active_backends() {
        let backends = vec![BackendDescriptor::new("b", CapabilityTier::Low).with_active(false)];
        assert!(select_for_tier(&backends, CapabilityTier::Low).is_err());
    }
}
