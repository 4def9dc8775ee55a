use roundtable_core::DebateState;

use crate::error::{OrchestratorError, Result};

/// Inputs that drive the debate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebateTrigger {
    Create,
    Start,
    StreamChunk,
    StreamComplete,
    /// Decide what follows a finished turn
    AutoAdvance { debate_finished: bool },
    Pause,
    Resume,
    Stop,
    ProviderError,
}

impl DebateTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Start => "start",
            Self::StreamChunk => "stream_chunk",
            Self::StreamComplete => "stream_complete",
            Self::AutoAdvance { .. } => "auto_advance",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::ProviderError => "provider_error",
        }
    }
}

/// Pure transition table for [`DebateState`].
///
/// A paused debate still lets its in-flight turn drain: chunks and the
/// completion are accepted without leaving `Paused`, and a drained turn that
/// finishes the last round completes the debate.
pub struct DebateStateMachine;

impl DebateStateMachine {
    pub fn next_state(from: DebateState, trigger: DebateTrigger) -> Result<DebateState> {
        use DebateState as S;
        use DebateTrigger as T;

        let to = match (from, trigger) {
            (S::Configuring, T::Create) => S::Ready,
            (S::Ready, T::Start) => S::Running,

            (S::Running, T::StreamChunk) => S::Running,
            (S::Paused, T::StreamChunk) => S::Paused,

            (S::Running, T::StreamComplete) => S::CheckingProgress,
            (S::Paused, T::StreamComplete) => S::Paused,

            (S::CheckingProgress, T::AutoAdvance { debate_finished }) => {
                if debate_finished {
                    S::Completed
                } else {
                    S::Running
                }
            }
            (S::Paused, T::AutoAdvance { debate_finished }) => {
                if debate_finished {
                    S::Completed
                } else {
                    S::Paused
                }
            }

            (S::Running | S::CheckingProgress, T::Pause) => S::Paused,
            (S::Paused | S::Error, T::Resume) => S::Running,

            // CheckingProgress covers a turn that could not be recorded
            (S::Running | S::CheckingProgress | S::Paused, T::ProviderError) => S::Error,

            (state, T::Stop) if !state.is_terminal() => S::Completed,

            (state, trigger) => {
                return Err(OrchestratorError::invalid_transition(state, trigger.as_str()))
            }
        };

        Ok(to)
    }

    pub fn can_apply(from: DebateState, trigger: DebateTrigger) -> bool {
        Self::next_state(from, trigger).is_ok()
    }

    /// Client commands accepted in `state`, for display.
    pub fn available_commands(state: DebateState) -> Vec<&'static str> {
        let mut commands = Vec::new();
        if state.can_request_turn() {
            commands.push("next_turn");
        }
        for trigger in [DebateTrigger::Pause, DebateTrigger::Resume, DebateTrigger::Stop] {
            if Self::can_apply(state, trigger) {
                commands.push(trigger.as_str());
            }
        }
        commands
    }
}
