use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::participant::has_control_chars;
use super::{DebateState, Metrics, Participant, Round, Turn, TurnSlot, TurnStatus};
use crate::error::CoreError;

pub const MIN_PARTICIPANTS: usize = 2;
pub const MAX_PARTICIPANTS: usize = 4;
pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 5;
pub const MIN_CONTEXT_WINDOW: usize = 1;
pub const MAX_CONTEXT_WINDOW: usize = 20;
pub const DEFAULT_CONTEXT_WINDOW: usize = 6;

fn default_context_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

/// Input for creating a debate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CreateDebateRequest {
    pub topic: String,
    pub participants: Vec<Participant>,
    pub max_rounds: u32,
    /// Number of prior turns (across all participants) sent as history
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// Total cost in USD at which a one-off warning event is emitted
    #[serde(default)]
    pub cost_warning_threshold: Option<f64>,
    /// Overrides the server default for issuing turns without a client call
    #[serde(default)]
    pub auto_advance: Option<bool>,
}

impl CreateDebateRequest {
    pub fn new(topic: impl Into<String>, participants: Vec<Participant>, max_rounds: u32) -> Self {
        Self {
            topic: topic.into(),
            participants,
            max_rounds,
            context_window: DEFAULT_CONTEXT_WINDOW,
            cost_warning_threshold: None,
            auto_advance: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.topic.trim().is_empty() {
            return Err(CoreError::validation("topic must not be empty"));
        }
        if has_control_chars(&self.topic) {
            return Err(CoreError::validation(
                "topic must be a single line without control characters",
            ));
        }

        let count = self.participants.len();
        if !(MIN_PARTICIPANTS..=MAX_PARTICIPANTS).contains(&count) {
            return Err(CoreError::validation(format!(
                "a debate needs {}-{} participants, got {}",
                MIN_PARTICIPANTS, MAX_PARTICIPANTS, count
            )));
        }

        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&self.max_rounds) {
            return Err(CoreError::validation(format!(
                "max_rounds must be {}-{}, got {}",
                MIN_ROUNDS, MAX_ROUNDS, self.max_rounds
            )));
        }

        if !(MIN_CONTEXT_WINDOW..=MAX_CONTEXT_WINDOW).contains(&self.context_window) {
            return Err(CoreError::validation(format!(
                "context_window must be {}-{}, got {}",
                MIN_CONTEXT_WINDOW, MAX_CONTEXT_WINDOW, self.context_window
            )));
        }

        if let Some(threshold) = self.cost_warning_threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(CoreError::validation(format!(
                    "cost_warning_threshold must be a non-negative amount, got {}",
                    threshold
                )));
            }
        }

        for (position, participant) in self.participants.iter().enumerate() {
            participant.validate(position)?;
        }

        Ok(())
    }
}

/// Outcome of recording a finished turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnRecorded {
    pub round: u32,
    pub round_completed: bool,
    pub debate_finished: bool,
}

/// The root aggregate of one orchestrated exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Debate {
    pub id: Uuid,
    pub topic: String,
    pub participants: Vec<Participant>,
    pub max_rounds: u32,
    pub context_window: usize,
    pub cost_warning_threshold: Option<f64>,
    pub auto_advance: bool,
    pub state: DebateState,
    /// 1-based
    pub current_round: u32,
    pub current_turn_index: usize,
    /// Rounds holding finished turns only; the last one may be incomplete
    pub rounds: Vec<Round>,
    /// The turn currently streaming, if any
    pub active_turn: Option<Turn>,
    /// The most recent turn that was cancelled or failed
    pub abandoned_turn: Option<Turn>,
    pub metrics: Metrics,
    pub last_error: Option<String>,
    pub manually_stopped: bool,
    pub cost_warning_triggered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Debate {
    /// Builds an unvalidated debate in `Configuring`.
    pub fn configure(request: CreateDebateRequest, auto_advance_default: bool) -> Self {
        let now = Utc::now();
        let metrics = Metrics::for_participants(&request.participants);
        Self {
            id: Uuid::new_v4(),
            topic: request.topic,
            participants: request.participants,
            max_rounds: request.max_rounds,
            context_window: request.context_window,
            cost_warning_threshold: request.cost_warning_threshold,
            auto_advance: request.auto_advance.unwrap_or(auto_advance_default),
            state: DebateState::Configuring,
            current_round: 1,
            current_turn_index: 0,
            rounds: Vec::new(),
            active_turn: None,
            abandoned_turn: None,
            metrics,
            last_error: None,
            manually_stopped: false,
            cost_warning_triggered: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn participant(&self, index: usize) -> Option<&Participant> {
        self.participants.get(index)
    }

    pub fn has_active_turn(&self) -> bool {
        self.active_turn.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.rounds.len() as u32 >= self.max_rounds
            && self.rounds.last().map(|r| r.completed).unwrap_or(false)
    }

    /// The next {round, participant} to speak, or `None` once every round is done.
    pub fn next_slot(&self) -> Option<TurnSlot> {
        if self.is_finished() {
            return None;
        }
        Some(TurnSlot {
            round: self.current_round,
            participant_index: self.current_turn_index,
        })
    }

    pub fn completed_turns(&self) -> impl Iterator<Item = &Turn> {
        self.rounds.iter().flat_map(|r| r.turns.iter())
    }

    pub fn completed_turn_count(&self) -> usize {
        self.rounds.iter().map(|r| r.turns.len()).sum()
    }

    /// The last `window` finished turns across all participants, oldest first.
    pub fn history(&self, window: usize) -> Vec<&Turn> {
        let total = self.completed_turn_count();
        self.completed_turns()
            .skip(total.saturating_sub(window))
            .collect()
    }

    /// Appends a completed turn to the current round and advances the counters.
    pub fn record_turn(&mut self, turn: Turn) -> Result<TurnRecorded, CoreError> {
        let expected = self.next_slot().ok_or(CoreError::DebateFinished)?;
        if turn.slot() != expected || turn.status != TurnStatus::Complete {
            return Err(CoreError::TurnOutOfOrder {
                expected_round: expected.round,
                expected_participant: expected.participant_index,
                round: turn.round,
                participant: turn.participant_index,
            });
        }

        if self.rounds.last().map(|r| r.number) != Some(expected.round) {
            self.rounds.push(Round::new(expected.round));
        }
        let participant_count = self.participants.len();
        let round = self
            .rounds
            .last_mut()
            .ok_or(CoreError::DebateFinished)?;
        round.turns.push(turn);

        let round_completed = round.turns.len() == participant_count;
        if round_completed {
            round.completed = true;
            self.current_turn_index = 0;
            if self.current_round < self.max_rounds {
                self.current_round += 1;
            }
        } else {
            self.current_turn_index += 1;
        }
        self.touch();

        Ok(TurnRecorded {
            round: expected.round,
            round_completed,
            debate_finished: self.is_finished(),
        })
    }
}

/// Lightweight listing entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DebateSummary {
    pub id: Uuid,
    pub topic: String,
    pub state: DebateState,
    pub participant_count: usize,
    pub current_round: u32,
    pub max_rounds: u32,
    pub total_cost: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<&Debate> for DebateSummary {
    fn from(debate: &Debate) -> Self {
        Self {
            id: debate.id,
            topic: debate.topic.clone(),
            state: debate.state,
            participant_count: debate.participants.len(),
            current_round: debate.current_round,
            max_rounds: debate.max_rounds,
            total_cost: debate.metrics.total_cost,
            updated_at: debate.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participants(count: usize) -> Vec<Participant> {
        (0..count)
            .map(|i| Participant::new(format!("P{}", i + 1), "test/model"))
            .collect()
    }

    fn debate(count: usize, rounds: u32) -> Debate {
        Debate::configure(
            CreateDebateRequest::new("Is Rust fun?", participants(count), rounds),
            false,
        )
    }

    fn finished_turn(debate: &Debate, text: &str) -> Turn {
        let slot = debate.next_slot().unwrap();
        let name = debate.participant(slot.participant_index).unwrap().name.clone();
        let mut turn = Turn::start(slot, name);
        turn.append(text);
        turn.complete(1, 0.0);
        turn
    }

    #[test]
    fn test_validate_cardinalities() {
        for count in 2..=4 {
            for rounds in 1..=5 {
                let request = CreateDebateRequest::new("t", participants(count), rounds);
                assert!(request.validate().is_ok(), "{} x {}", count, rounds);
            }
        }
        for count in [0, 1, 5] {
            assert!(CreateDebateRequest::new("t", participants(count), 2)
                .validate()
                .is_err());
        }
        for rounds in [0, 6] {
            assert!(CreateDebateRequest::new("t", participants(2), rounds)
                .validate()
                .is_err());
        }
    }

    #[test]
    fn test_validate_context_window_and_threshold() {
        let mut request = CreateDebateRequest::new("t", participants(2), 2);
        request.context_window = 0;
        assert!(request.validate().is_err());

        request.context_window = 4;
        request.cost_warning_threshold = Some(-1.0);
        assert!(request.validate().is_err());

        request.cost_warning_threshold = Some(0.5);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_multiline_topic() {
        let request = CreateDebateRequest::new("Cats\n## Round 99", participants(2), 2);
        assert!(matches!(request.validate(), Err(CoreError::Validation(_))));

        let request = CreateDebateRequest::new("Cats vs. dogs: round two?", participants(2), 2);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_slots_follow_participant_order() {
        let mut debate = debate(3, 2);
        let mut seen = Vec::new();
        while let Some(slot) = debate.next_slot() {
            seen.push((slot.round, slot.participant_index));
            let turn = finished_turn(&debate, "x");
            debate.record_turn(turn).unwrap();
        }
        assert_eq!(
            seen,
            vec![(1, 0), (1, 1), (1, 2), (2, 0), (2, 1), (2, 2)]
        );
        assert!(debate.is_finished());
        assert_eq!(debate.current_round, 2);
        assert!(debate.rounds.iter().all(|r| r.completed));
    }

    #[test]
    fn test_record_turn_reports_round_completion() {
        let mut debate = debate(2, 1);
        let first = debate.record_turn(finished_turn(&debate, "a")).unwrap();
        assert!(!first.round_completed);
        assert!(!first.debate_finished);

        let second = debate.record_turn(finished_turn(&debate, "b")).unwrap();
        assert!(second.round_completed);
        assert!(second.debate_finished);
        assert_eq!(debate.next_slot(), None);
    }

    #[test]
    fn test_record_turn_rejects_out_of_order() {
        let mut debate = debate(2, 1);
        let mut turn = Turn::start(
            TurnSlot {
                round: 1,
                participant_index: 1,
            },
            "P2",
        );
        turn.complete(1, 0.0);

        let err = debate.record_turn(turn).unwrap_err();
        assert!(matches!(err, CoreError::TurnOutOfOrder { .. }));
        assert!(debate.rounds.is_empty());
    }

    #[test]
    fn test_record_turn_rejects_streaming_turn() {
        let mut debate = debate(2, 1);
        let turn = Turn::start(debate.next_slot().unwrap(), "P1");
        assert!(debate.record_turn(turn).is_err());
    }

    #[test]
    fn test_history_window() {
        let mut debate = debate(2, 3);
        for text in ["one", "two", "three", "four"] {
            let turn = finished_turn(&debate, text);
            debate.record_turn(turn).unwrap();
        }

        let history: Vec<&str> = debate
            .history(3)
            .into_iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(history, vec!["two", "three", "four"]);
        assert_eq!(debate.history(10).len(), 4);
    }

    #[test]
    fn test_summary_from_debate() {
        let debate = debate(3, 4);
        let summary = DebateSummary::from(&debate);
        assert_eq!(summary.participant_count, 3);
        assert_eq!(summary.max_rounds, 4);
        assert_eq!(summary.state, DebateState::Configuring);
    }
}
