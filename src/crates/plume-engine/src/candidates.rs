//! Bounded-concurrency candidate generation.
//!
//! Breadth strategies (several independent draft candidates for the same
//! seed) dispatch in fixed-size concurrent batches rather than unbounded
//! fan-out, to respect backend rate limits. A batch fully resolves before
//! the next one starts; one candidate's failure never cancels its
//! siblings. Completion order within a batch is arbitrary, so candidate
//! selection works over the collected results, not arrival order.

use crate::engine::GenerationEngine;
use futures::future::join_all;
use plume_core::error::Result;
use plume_core::models::generation::{GenerationRequest, GenerationResult};
use tracing::debug;

impl GenerationEngine {
    /// Run several candidate requests in bounded concurrent batches.
    ///
    /// Results are returned in input order, each independently a success
    /// or failure.
    pub async fn generate_candidates(
        &self,
        requests: Vec<GenerationRequest>,
    ) -> Vec<Result<GenerationResult>> {
        let batch_size = self.config().candidate_batch_size.max(1);
        let mut results = Vec::with_capacity(requests.len());
        let mut queue = requests.into_iter();

        loop {
            let batch: Vec<GenerationRequest> = queue.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            debug!(batch_len = batch.len(), "dispatching candidate batch");
            let outcomes = join_all(batch.into_iter().map(|request| self.handle(request))).await;
            results.extend(outcomes);
        }

        results
    }
}

/// Pick the best candidate by rule-check score.
///
/// Failed candidates are skipped; ties keep the earliest.
pub fn select_best(results: &[Result<GenerationResult>]) -> Option<&GenerationResult> {
    results
        .iter()
        .filter_map(|outcome| outcome.as_ref().ok())
        .fold(None, |best: Option<&GenerationResult>, candidate| match best {
            Some(current) if current.check.score >= candidate.check.score => Some(current),
            _ => Some(candidate),
        })
}
