use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::types::{ChatMessage, CompletionRequest, ProviderError, ProviderEvent};
use super::{ProviderAdapter, ProviderStream};
use crate::aggregator::estimate_tokens;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Fallback USD pricing used when the API does not report cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderPricing {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ProviderPricing {
    fn completion_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.completion_per_1k / 1000.0
    }

    fn usage_cost(&self, usage: &ChunkUsage) -> f64 {
        usage.prompt_tokens as f64 * self.prompt_per_1k / 1000.0
            + self.completion_cost(usage.completion_tokens)
    }
}

/// Streaming client for OpenRouter `/chat/completions`.
///
/// Other OpenAI-compatible endpoints work once usage reporting is turned
/// off with [`with_usage_reporting`](Self::with_usage_reporting), since the
/// `usage` request field is an OpenRouter extension.
#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    pricing: ProviderPricing,
    include_usage: bool,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pricing: ProviderPricing::default(),
            include_usage: true,
        }
    }

    /// Reads the API key from the environment variable `api_key_env`.
    pub fn from_env(api_key_env: &str, base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| ProviderError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self::new(api_key, base_url))
    }

    pub fn with_pricing(mut self, pricing: ProviderPricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Whether to ask for a trailing usage chunk. Without it, turn figures
    /// come from the per-chunk estimates.
    pub fn with_usage_reporting(mut self, include_usage: bool) -> Self {
        self.include_usage = include_usage;
        self
    }

    fn request_body(&self, request: CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            messages: request.messages(),
            model: request.model,
            temperature: Some(request.sampling.temperature),
            max_tokens: request.sampling.max_tokens,
            stream: true,
            usage: self.include_usage.then_some(UsageOptions { include: true }),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let body = self.request_body(request);
        debug!(
            "Creating streaming chat completion with {} messages, model {}",
            body.messages.len(),
            body.model
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                warn!("Rate limited by provider");
                return Err(ProviderError::RateLimited);
            }

            if let Ok(error_resp) = serde_json::from_str::<OpenRouterError>(&error_text) {
                error!(
                    "Provider API error: {} (type: {:?})",
                    error_resp.error.message, error_resp.error.error_type
                );
                return Err(ProviderError::Api {
                    message: error_resp.error.message,
                    status_code: Some(status.as_u16()),
                });
            }

            return Err(ProviderError::Api {
                message: error_text,
                status_code: Some(status.as_u16()),
            });
        }

        let pricing = self.pricing;
        let byte_stream = response
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));

        let events = byte_stream
            .eventsource()
            .map(move |event_result| {
                let events = match event_result {
                    Ok(event) => parse_sse_data(&event.data, &pricing),
                    Err(e) => vec![ProviderEvent::error(format!("SSE error: {}", e))],
                };
                stream::iter(events)
            })
            .flatten();

        Ok(events.boxed())
    }
}

/// Maps one SSE `data:` payload to provider events.
fn parse_sse_data(data: &str, pricing: &ProviderPricing) -> Vec<ProviderEvent> {
    if data.trim() == "[DONE]" {
        return vec![ProviderEvent::Complete {
            final_tokens: None,
            final_cost: None,
        }];
    }

    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {}", e);
            return Vec::new();
        }
    };

    if let Some(err) = chunk.error {
        return vec![ProviderEvent::error(err.message)];
    }

    let mut events = Vec::new();
    let text: String = chunk
        .choices
        .iter()
        .filter_map(|choice| choice.delta.content.as_deref())
        .collect();
    if !text.is_empty() {
        let tokens = estimate_tokens(&text);
        events.push(ProviderEvent::Chunk {
            tokens_delta: Some(tokens),
            cost_delta: Some(pricing.completion_cost(tokens)),
            text,
        });
    }

    if let Some(usage) = chunk.usage {
        events.push(ProviderEvent::Complete {
            final_tokens: Some(usage.total_tokens),
            final_cost: Some(usage.cost.unwrap_or_else(|| pricing.usage_cost(&usage))),
        });
    }

    events
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageOptions>,
}

/// Asks OpenRouter to append a usage chunk before `[DONE]`
#[derive(Debug, Serialize)]
struct UsageOptions {
    include: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChatChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    error: Option<OpenRouterErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkChoice {
    delta: ChatDelta,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
    #[serde(default)]
    cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterError {
    error: OpenRouterErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenRouterErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SamplingParams;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pricing() -> ProviderPricing {
        ProviderPricing {
            prompt_per_1k: 1.0,
            completion_per_1k: 2.0,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "openai/gpt-4o".to_string(),
            system_prompt: "You debate.".to_string(),
            history: Vec::new(),
            prompt: "Open the debate.".to_string(),
            sampling: SamplingParams {
                temperature: 0.7,
                max_tokens: None,
            },
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OpenRouterProvider::new("test-key", "https://openrouter.ai/api/v1/");
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(client.name(), "openrouter");
    }

    #[test]
    fn test_usage_field_is_optional() {
        let provider = OpenRouterProvider::new("key", DEFAULT_BASE_URL);
        let body = serde_json::to_value(provider.request_body(request())).unwrap();
        assert_eq!(body["usage"], serde_json::json!({ "include": true }));
        assert_eq!(body["stream"], true);

        let provider = provider.with_usage_reporting(false);
        let body = serde_json::to_value(provider.request_body(request())).unwrap();
        assert!(body.get("usage").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_content_chunk() {
        let data = r#"{"id":"1","choices":[{"index":0,"delta":{"content":"Hello world!"}}]}"#;
        let events = parse_sse_data(data, &pricing());
        assert_eq!(
            events,
            vec![ProviderEvent::Chunk {
                text: "Hello world!".to_string(),
                tokens_delta: Some(3),
                cost_delta: Some(0.006),
            }]
        );
    }

    #[test]
    fn test_parse_usage_chunk() {
        let data = r#"{"id":"1","choices":[],"usage":{"prompt_tokens":100,"completion_tokens":50,"total_tokens":150}}"#;
        let events = parse_sse_data(data, &pricing());
        assert_eq!(
            events,
            vec![ProviderEvent::Complete {
                final_tokens: Some(150),
                final_cost: Some(0.2),
            }]
        );

        let data = r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2,"cost":0.5}}"#;
        assert_eq!(
            parse_sse_data(data, &pricing()),
            vec![ProviderEvent::Complete {
                final_tokens: Some(2),
                final_cost: Some(0.5),
            }]
        );
    }

    #[test]
    fn test_parse_done_error_and_garbage() {
        assert!(matches!(
            parse_sse_data("[DONE]", &pricing()).as_slice(),
            [ProviderEvent::Complete {
                final_tokens: None,
                ..
            }]
        ));
        assert_eq!(
            parse_sse_data(r#"{"error":{"message":"overloaded"}}"#, &pricing()),
            vec![ProviderEvent::error("overloaded")]
        );
        assert!(parse_sse_data("not json", &pricing()).is_empty());
    }

    #[tokio::test]
    async fn test_stream_completion_against_mock() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Rust \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"wins.\"}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":4,\"total_tokens\":14,\"cost\":0.01}}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = OpenRouterProvider::new("key", server.uri());
        let events: Vec<ProviderEvent> = provider
            .stream_completion(request())
            .await
            .unwrap()
            .collect()
            .await;

        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ProviderEvent::Chunk { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Rust wins.");
        assert!(events.contains(&ProviderEvent::Complete {
            final_tokens: Some(14),
            final_cost: Some(0.01),
        }));
    }

    #[tokio::test]
    async fn test_stream_completion_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"message":"bad model","type":"invalid_request"}}"#),
            )
            .mount(&server)
            .await;

        let provider = OpenRouterProvider::new("key", server.uri());
        match provider.stream_completion(request()).await {
            Err(ProviderError::Api {
                message,
                status_code,
            }) => {
                assert_eq!(message, "bad model");
                assert_eq!(status_code, Some(400));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_from_env_missing_key() {
        let result = OpenRouterProvider::from_env("ROUNDTABLE_TEST_KEY_UNSET", DEFAULT_BASE_URL);
        assert!(matches!(result, Err(ProviderError::MissingApiKey(_))));
    }
}
