use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state of a debate.
///
/// Transitions between states are validated by the orchestrator's state
/// machine. The predicates below are derived purely from the state so that
/// any presentation layer can decide what to show without tracking flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum DebateState {
    #[default]
    Configuring,
    Ready,
    Running,
    /// Transient: a turn has finished and the next slot is being decided
    CheckingProgress,
    Paused,
    /// A provider call failed; the transcript so far stays readable
    Error,
    Completed,
}

impl DebateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuring => "configuring",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::CheckingProgress => "checking_progress",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether a transcript view is meaningful in this state.
    pub fn shows_transcript(&self) -> bool {
        matches!(
            self,
            Self::Running | Self::CheckingProgress | Self::Paused | Self::Error | Self::Completed
        )
    }

    /// Whether the configuration form is still editable.
    pub fn shows_configuration(&self) -> bool {
        matches!(self, Self::Configuring | Self::Ready)
    }

    pub fn can_request_turn(&self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Running | Self::CheckingProgress)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused | Self::Error)
    }

    pub fn can_stop(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for DebateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
