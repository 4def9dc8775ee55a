use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "Turn out of order: expected round {expected_round} participant {expected_participant}, \
         got round {round} participant {participant}"
    )]
    TurnOutOfOrder {
        expected_round: u32,
        expected_participant: usize,
        round: u32,
        participant: usize,
    },

    #[error("Turn recorded after the final round")]
    DebateFinished,

    #[error("Participant not found at position {0}")]
    ParticipantNotFound(usize),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
