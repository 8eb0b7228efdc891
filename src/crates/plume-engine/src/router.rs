//! Cost/quality-aware backend routing.
//!
//! Routing is a pure function of the request's signals and the backend
//! registry: the same inputs always produce the same decision. Harder
//! tasks (low confidence, high conflict, high complexity) score higher
//! and are routed to higher-capability backends; cost headroom pulls the
//! score down.

use plume_core::error::Result;
use plume_core::models::routing::{
    select_for_tier, BackendDescriptor, CapabilityTier, RoutingDecision, RoutingSignals,
    RoutingStrategy, TaskIntent,
};
use tracing::debug;

/// Weight of `1 - confidence` in the routing score.
const W_CONFIDENCE: f64 = 0.45;

/// Weight of conflict density.
const W_CONFLICT: f64 = 0.30;

/// Weight of complexity.
const W_COMPLEXITY: f64 = 0.15;

/// Weight of budget headroom (subtracted).
const W_BUDGET: f64 = 0.10;

/// Scores at or below this select the small strategy.
const SMALL_CEILING: f64 = 0.35;

/// Scores at or below this (and above [`SMALL_CEILING`]) select the
/// small-with-fallback strategy; anything higher selects big.
const FALLBACK_CEILING: f64 = 0.65;

/// Selects a backend strategy from routing signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRouter;

impl ModelRouter {
    /// Create a router.
    pub fn new() -> Self {
        Self
    }

    /// The routing scalar for a set of signals.
    pub fn score(&self, signals: &RoutingSignals) -> f64 {
        W_CONFIDENCE * (1.0 - signals.confidence)
            + W_CONFLICT * signals.conflict_density
            + W_COMPLEXITY * signals.complexity
            - W_BUDGET * signals.budget_factor
    }

    /// Route a request to a backend strategy.
    ///
    /// Fails only when no active backend exists at all.
    pub fn route(
        &self,
        signals: &RoutingSignals,
        backends: &[BackendDescriptor],
    ) -> Result<RoutingDecision> {
        let score = self.score(signals);
        let strategy = strategy_for(score);

        let (primary, fallback) = match strategy {
            RoutingStrategy::Small => (select_for_tier(backends, CapabilityTier::Low)?, None),
            RoutingStrategy::SmallWithFallback => {
                let primary = select_for_tier(backends, CapabilityTier::Low)?;
                let fallback = select_for_tier(backends, CapabilityTier::High)?;
                let fallback = if fallback == primary {
                    None
                } else {
                    Some(fallback)
                };
                (primary, fallback)
            }
            RoutingStrategy::Big => (select_for_tier(backends, CapabilityTier::High)?, None),
        };

        let reasoning = format!(
            "score {:.3} (confidence {:.2}, conflict {:.2}, complexity {:.2}, headroom {:.2}) -> {} on '{}'{}",
            score,
            signals.confidence,
            signals.conflict_density,
            signals.complexity,
            signals.budget_factor,
            strategy,
            primary,
            fallback
                .as_deref()
                .map(|f| format!(" with fallback '{}'", f))
                .unwrap_or_default(),
        );
        debug!(score, strategy = %strategy, primary = %primary, "routing decision");

        Ok(RoutingDecision {
            strategy,
            primary,
            fallback,
            score,
            reasoning,
        })
    }

    /// Route by a-priori task intent instead of computed signals.
    ///
    /// The intent maps to a capability tier through a static table; the
    /// nominal score reflects the tier rather than a computation.
    pub fn route_intent(
        &self,
        intent: TaskIntent,
        backends: &[BackendDescriptor],
    ) -> Result<RoutingDecision> {
        let tier = intent.required_tier();
        let (strategy, score) = match tier {
            CapabilityTier::Low => (RoutingStrategy::Small, 0.25),
            CapabilityTier::High => (RoutingStrategy::Big, 0.75),
        };
        let primary = select_for_tier(backends, tier)?;

        Ok(RoutingDecision {
            strategy,
            fallback: None,
            score,
            reasoning: format!("intent {} mapped to {} tier on '{}'", intent, tier, primary),
            primary,
        })
    }
}

/// Map a score onto a strategy; boundaries are exact.
fn strategy_for(score: f64) -> RoutingStrategy {
    if score <= SMALL_CEILING {
        RoutingStrategy::Small
    } else if score <= FALLBACK_CEILING {
        RoutingStrategy::SmallWithFallback
    } else {
        RoutingStrategy::Big
    }
}
