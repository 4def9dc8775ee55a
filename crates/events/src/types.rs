//! Event types for the Roundtable event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Bus-wide publish order
    pub sequence: u64,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Debate lifecycle
    #[serde(rename = "debate.created")]
    DebateCreated { debate_id: Uuid, topic: String },

    /// A state machine transition; `reason` names the trigger
    #[serde(rename = "debate.state_changed")]
    DebateStateChanged {
        debate_id: Uuid,
        from_state: String,
        to_state: String,
        reason: String,
    },

    #[serde(rename = "debate.completed")]
    DebateCompleted { debate_id: Uuid, manual_stop: bool },

    /// Debate was torn down or evicted from the store
    #[serde(rename = "debate.removed")]
    DebateRemoved { debate_id: Uuid },

    // Turn events
    #[serde(rename = "turn.started")]
    TurnStarted {
        debate_id: Uuid,
        turn_id: Uuid,
        round: u32,
        participant_index: usize,
        participant_name: String,
    },

    /// Streamed fragment; `tokens` and `cost` are deltas
    #[serde(rename = "turn.chunk")]
    TurnChunk {
        debate_id: Uuid,
        turn_id: Uuid,
        round: u32,
        participant_index: usize,
        text: String,
        tokens: u64,
        cost: f64,
    },

    #[serde(rename = "turn.completed")]
    TurnCompleted {
        debate_id: Uuid,
        turn_id: Uuid,
        round: u32,
        participant_index: usize,
        tokens: u64,
        cost: f64,
        latency_ms: u64,
    },

    #[serde(rename = "turn.failed")]
    TurnFailed {
        debate_id: Uuid,
        turn_id: Uuid,
        round: u32,
        participant_index: usize,
        reason: String,
    },

    #[serde(rename = "round.completed")]
    RoundCompleted { debate_id: Uuid, round: u32 },

    // Metrics
    /// Running cost crossed the configured threshold (fires once)
    #[serde(rename = "cost.warning")]
    CostWarning {
        debate_id: Uuid,
        total_cost: f64,
        threshold: f64,
    },

    // System events
    /// Generic error event
    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// Get the debate ID associated with this event, if any
    pub fn debate_id(&self) -> Option<Uuid> {
        match self {
            Event::DebateCreated { debate_id, .. }
            | Event::DebateStateChanged { debate_id, .. }
            | Event::DebateCompleted { debate_id, .. }
            | Event::DebateRemoved { debate_id }
            | Event::TurnStarted { debate_id, .. }
            | Event::TurnChunk { debate_id, .. }
            | Event::TurnCompleted { debate_id, .. }
            | Event::TurnFailed { debate_id, .. }
            | Event::RoundCompleted { debate_id, .. }
            | Event::CostWarning { debate_id, .. } => Some(*debate_id),
            Event::Error { .. } => None,
        }
    }

    /// Wire name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::DebateCreated { .. } => "debate.created",
            Event::DebateStateChanged { .. } => "debate.state_changed",
            Event::DebateCompleted { .. } => "debate.completed",
            Event::DebateRemoved { .. } => "debate.removed",
            Event::TurnStarted { .. } => "turn.started",
            Event::TurnChunk { .. } => "turn.chunk",
            Event::TurnCompleted { .. } => "turn.completed",
            Event::TurnFailed { .. } => "turn.failed",
            Event::RoundCompleted { .. } => "round.completed",
            Event::CostWarning { .. } => "cost.warning",
            Event::Error { .. } => "error",
        }
    }
}
