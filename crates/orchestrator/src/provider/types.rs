use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role in a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Everything a provider needs for one participant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    /// Prior turns, oldest first
    pub history: Vec<ChatMessage>,
    /// The instruction for this turn
    pub prompt: String,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    /// Flattens into the chat message list most APIs expect.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.prompt.clone()));
        messages
    }
}

/// One item of a provider stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Incremental text; usage deltas are optional and estimated when absent
    Chunk {
        text: String,
        tokens_delta: Option<u64>,
        cost_delta: Option<f64>,
    },
    /// Stream finished; final usage when the provider reports it
    Complete {
        final_tokens: Option<u64>,
        final_cost: Option<f64>,
    },
    Error {
        reason: String,
    },
}

impl ProviderEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk {
            text: text.into(),
            tokens_delta: None,
            cost_delta: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Provider rate limited")]
    RateLimited,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing API key: set {0}")]
    MissingApiKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_order() {
        let request = CompletionRequest {
            model: "m".to_string(),
            system_prompt: "sys".to_string(),
            history: vec![ChatMessage::user("A: hi"), ChatMessage::assistant("hello")],
            prompt: "your turn".to_string(),
            sampling: SamplingParams {
                temperature: 0.5,
                max_tokens: None,
            },
        };

        let messages = request.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::system("sys"));
        assert_eq!(messages[3], ChatMessage::user("your turn"));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
