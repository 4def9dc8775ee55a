use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    #[default]
    Streaming,
    Complete,
    Failed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// The {round, participant} position a turn occupies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TurnSlot {
    pub round: u32,
    pub participant_index: usize,
}

/// One participant's streamed response within one round.
///
/// A turn only accepts text and usage while it is `Streaming`; once it is
/// complete or failed it is frozen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Turn {
    pub id: Uuid,
    pub round: u32,
    pub participant_index: usize,
    pub participant_name: String,
    pub content: String,
    pub tokens: u64,
    pub cost: f64,
    pub latency_ms: u64,
    pub status: TurnStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn start(slot: TurnSlot, participant_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            round: slot.round,
            participant_index: slot.participant_index,
            participant_name: participant_name.into(),
            content: String::new(),
            tokens: 0,
            cost: 0.0,
            latency_ms: 0,
            status: TurnStatus::Streaming,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn slot(&self) -> TurnSlot {
        TurnSlot {
            round: self.round,
            participant_index: self.participant_index,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == TurnStatus::Streaming
    }

    /// Appends a fragment. Returns false if the turn is already frozen.
    pub fn append(&mut self, text: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.content.push_str(text);
        true
    }

    pub fn complete(&mut self, tokens: u64, cost: f64) {
        if !self.is_streaming() {
            return;
        }
        let now = Utc::now();
        self.tokens = tokens;
        self.cost = cost;
        self.latency_ms = elapsed_ms(self.started_at, now);
        self.status = TurnStatus::Complete;
        self.completed_at = Some(now);
    }

    /// Marks the turn failed and drops its partial usage figures.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.is_streaming() {
            return;
        }
        let now = Utc::now();
        self.tokens = 0;
        self.cost = 0.0;
        self.latency_ms = elapsed_ms(self.started_at, now);
        self.status = TurnStatus::Failed;
        self.error = Some(reason.into());
        self.completed_at = Some(now);
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// One complete pass through all participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Round {
    pub number: u32,
    pub turns: Vec<Turn>,
    pub completed: bool,
}

impl Round {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            turns: Vec::new(),
            completed: false,
        }
    }
}
