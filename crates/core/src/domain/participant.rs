use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

fn default_temperature() -> f32 {
    0.7
}

/// A model persona taking turns in a debate.
///
/// Participants are identified by their position in the debate's participant
/// list. That position is also their speaking order in every round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Participant {
    /// Display name used in prompts and transcripts
    pub name: String,
    /// Provider model identifier (e.g., "anthropic/claude-3.5-sonnet")
    pub model: String,
    /// System instructions sent with every turn
    #[serde(default)]
    pub system_prompt: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Participant {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            system_prompt: String::new(),
            temperature: default_temperature(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn validate(&self, position: usize) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "participant {} has an empty name",
                position
            )));
        }
        if has_control_chars(&self.name) {
            return Err(CoreError::validation(format!(
                "participant {} name must be a single line without control characters",
                position
            )));
        }
        if self.model.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "participant '{}' has no model",
                self.name
            )));
        }
        if has_control_chars(&self.model) {
            return Err(CoreError::validation(format!(
                "participant '{}' model must not contain control characters",
                self.name
            )));
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(CoreError::validation(format!(
                "participant '{}' temperature {} is outside {}..={}",
                self.name, self.temperature, MIN_TEMPERATURE, MAX_TEMPERATURE
            )));
        }
        Ok(())
    }
}

/// Names and topics end up in markdown headings, so they must stay on one line.
pub(crate) fn has_control_chars(value: &str) -> bool {
    value.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_builder() {
        let participant = Participant::new("Skeptic", "openai/gpt-4o")
            .with_system_prompt("Challenge every claim.")
            .with_temperature(0.3);

        assert_eq!(participant.name, "Skeptic");
        assert_eq!(participant.system_prompt, "Challenge every claim.");
        assert_eq!(participant.temperature, 0.3);
        assert!(participant.validate(0).is_ok());
    }

    #[test]
    fn test_participant_validation() {
        assert!(Participant::new("", "m").validate(0).is_err());
        assert!(Participant::new("A", " ").validate(0).is_err());
        assert!(Participant::new("A", "m")
            .with_temperature(2.5)
            .validate(0)
            .is_err());
    }

    #[test]
    fn test_participant_name_must_be_single_line() {
        assert!(Participant::new("Cat\n# Debate: x", "m").validate(1).is_err());
        assert!(Participant::new("Tab\tbed", "m").validate(1).is_err());
        assert!(Participant::new("A", "model\r\n").validate(1).is_err());
        assert!(Participant::new("Dr. Ana | Economist", "m").validate(1).is_ok());
    }

    #[test]
    fn test_participant_deserialize_defaults() {
        let json = r#"{"name":"Optimist","model":"anthropic/claude-3.5-sonnet"}"#;
        let participant: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(participant.temperature, 0.7);
        assert!(participant.system_prompt.is_empty());
    }
}
