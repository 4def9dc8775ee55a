use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Participant;
use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ParticipantMetrics {
    pub participant_index: usize,
    pub name: String,
    pub tokens: u64,
    pub cost: f64,
}

/// Running token and cost totals for a debate.
///
/// Figures only ever grow. `total_cost` is recomputed from the per-participant
/// breakdown after every mutation so the two never disagree.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Metrics {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub by_participant: Vec<ParticipantMetrics>,
}

impl Metrics {
    pub fn for_participants(participants: &[Participant]) -> Self {
        Self {
            total_tokens: 0,
            total_cost: 0.0,
            by_participant: participants
                .iter()
                .enumerate()
                .map(|(participant_index, p)| ParticipantMetrics {
                    participant_index,
                    name: p.name.clone(),
                    tokens: 0,
                    cost: 0.0,
                })
                .collect(),
        }
    }

    /// Adds usage for one participant. Negative or non-finite cost is ignored.
    pub fn add(&mut self, participant_index: usize, tokens: u64, cost: f64) -> Result<(), CoreError> {
        let entry = self
            .by_participant
            .get_mut(participant_index)
            .ok_or(CoreError::ParticipantNotFound(participant_index))?;

        let cost = if cost.is_finite() && cost > 0.0 { cost } else { 0.0 };
        entry.tokens = entry.tokens.saturating_add(tokens);
        entry.cost += cost;

        self.total_tokens = self.by_participant.iter().map(|p| p.tokens).sum();
        self.total_cost = self.participant_cost_sum();
        Ok(())
    }

    pub fn participant_cost_sum(&self) -> f64 {
        self.by_participant.iter().map(|p| p.cost).sum()
    }

    pub fn participant(&self, participant_index: usize) -> Option<&ParticipantMetrics> {
        self.by_participant.get(participant_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Metrics {
        Metrics::for_participants(&[Participant::new("A", "m1"), Participant::new("B", "m2")])
    }

    #[test]
    fn test_add_updates_participant_and_total() {
        let mut metrics = metrics();
        metrics.add(0, 10, 0.1).unwrap();
        metrics.add(1, 5, 0.2).unwrap();
        metrics.add(0, 1, 0.3).unwrap();

        assert_eq!(metrics.total_tokens, 16);
        assert_eq!(metrics.participant(0).unwrap().tokens, 11);
        assert_eq!(metrics.total_cost, metrics.participant_cost_sum());
    }

    #[test]
    fn test_negative_cost_is_ignored() {
        let mut metrics = metrics();
        metrics.add(0, 0, 0.5).unwrap();
        metrics.add(0, 0, -0.25).unwrap();
        metrics.add(0, 0, f64::NAN).unwrap();

        assert_eq!(metrics.participant(0).unwrap().cost, 0.5);
        assert_eq!(metrics.total_cost, 0.5);
    }

    #[test]
    fn test_unknown_participant() {
        let mut metrics = metrics();
        assert_eq!(
            metrics.add(7, 1, 0.0),
            Err(CoreError::ParticipantNotFound(7))
        );
    }
}
