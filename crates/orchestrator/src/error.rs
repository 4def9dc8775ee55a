use roundtable_core::{CoreError, DebateState};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: cannot {trigger} while {from}")]
    InvalidTransition { from: DebateState, trigger: String },

    #[error("Debate {debate_id} already has turn {turn_id} streaming")]
    TurnInProgress { debate_id: Uuid, turn_id: Uuid },

    #[error("Debate not found: {0}")]
    NotFound(Uuid),

    #[error("Debate {0} has no completed turns to summarize")]
    NoCompletedTurns(Uuid),

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl OrchestratorError {
    pub fn invalid_transition(from: DebateState, trigger: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from,
            trigger: trigger.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Both a forbidden command and a second concurrent turn are state conflicts.
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. } | Self::TurnInProgress { .. }
        )
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(message) => Self::Validation(message),
            other => Self::InvariantViolation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
