//! Live token and cost accounting for the active turn.
//!
//! Deltas from each streamed fragment land on the turn and on the debate
//! totals immediately. A completed turn is locked to the provider's final
//! usage; a failed turn drops its own figures but the debate totals keep
//! whatever was already billed.

use roundtable_core::{Metrics, Turn};

use crate::error::{OrchestratorError, Result};

/// Rough characters-per-token ratio used when a provider reports no usage.
const CHARS_PER_TOKEN: usize = 4;

pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

fn sanitize_cost(cost: f64) -> f64 {
    if cost.is_finite() && cost > 0.0 {
        cost
    } else {
        0.0
    }
}

pub struct CostAggregator;

impl CostAggregator {
    /// Applies one fragment to the streaming `turn` and the debate totals.
    pub fn apply_chunk(
        metrics: &mut Metrics,
        turn: &mut Turn,
        text: &str,
        tokens: u64,
        cost: f64,
    ) -> Result<()> {
        if !turn.append(text) {
            return Err(OrchestratorError::invariant(format!(
                "chunk applied to turn {} after it was {}",
                turn.id,
                turn.status.as_str()
            )));
        }

        let cost = sanitize_cost(cost);
        turn.tokens = turn.tokens.saturating_add(tokens);
        turn.cost += cost;
        metrics.add(turn.participant_index, tokens, cost)?;
        Ok(())
    }

    /// Locks the final figures onto the turn and marks it complete.
    ///
    /// Missing final usage keeps the running figures. When the provider's
    /// final numbers exceed the running ones the difference is added to the
    /// totals; totals never shrink.
    pub fn finalize(
        metrics: &mut Metrics,
        turn: &mut Turn,
        final_tokens: Option<u64>,
        final_cost: Option<f64>,
    ) -> Result<()> {
        if !turn.is_streaming() {
            return Err(OrchestratorError::invariant(format!(
                "turn {} finalized twice",
                turn.id
            )));
        }

        let tokens = final_tokens.unwrap_or(turn.tokens);
        let cost = final_cost.map(sanitize_cost).unwrap_or(turn.cost);

        let extra_tokens = tokens.saturating_sub(turn.tokens);
        let extra_cost = (cost - turn.cost).max(0.0);
        metrics.add(turn.participant_index, extra_tokens, extra_cost)?;

        turn.complete(tokens, cost);
        Ok(())
    }

    /// Fails the turn. Its partial usage stays counted in `Metrics`.
    pub fn discard(turn: &mut Turn, reason: impl Into<String>) {
        turn.fail(reason);
    }
}
