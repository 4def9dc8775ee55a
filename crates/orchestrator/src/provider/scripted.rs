use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;

use super::types::{CompletionRequest, ProviderError, ProviderEvent};
use super::{ProviderAdapter, ProviderStream};

/// One step of a scripted response.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk {
        text: String,
        tokens: Option<u64>,
        cost: Option<f64>,
    },
    /// Block until the gate is notified
    Wait(Arc<Notify>),
    Complete {
        tokens: Option<u64>,
        cost: Option<f64>,
    },
    Fail(String),
    /// Never yield again
    Hang,
}

impl ScriptStep {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk {
            text: text.into(),
            tokens: None,
            cost: None,
        }
    }

    pub fn priced_chunk(text: impl Into<String>, tokens: u64, cost: f64) -> Self {
        Self::Chunk {
            text: text.into(),
            tokens: Some(tokens),
            cost: Some(cost),
        }
    }

    pub fn complete() -> Self {
        Self::Complete {
            tokens: None,
            cost: None,
        }
    }
}

enum Script {
    Steps(Vec<ScriptStep>),
    RejectCall(String),
}

/// In-memory provider that replays queued scripts, one per call.
///
/// When the queue is empty every call answers with a single chunk naming the
/// model, followed by completion.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next unanswered call.
    pub fn push_response(&self, steps: Vec<ScriptStep>) -> &Self {
        self.lock_scripts().push_back(Script::Steps(steps));
        self
    }

    /// Queue a call that fails before streaming starts.
    pub fn push_rejection(&self, message: impl Into<String>) -> &Self {
        self.lock_scripts().push_back(Script::RejectCall(message.into()));
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, VecDeque<Script>> {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderStream, ProviderError> {
        let default_steps = vec![
            ScriptStep::chunk(format!("{} responds.", request.model)),
            ScriptStep::complete(),
        ];
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        let script = self.lock_scripts().pop_front();
        let steps = match script {
            Some(Script::Steps(steps)) => steps,
            Some(Script::RejectCall(message)) => {
                return Err(ProviderError::Api {
                    message,
                    status_code: None,
                })
            }
            None => default_steps,
        };

        let events = stream::unfold(steps.into_iter(), |mut steps| async move {
            loop {
                let event = match steps.next()? {
                    ScriptStep::Chunk { text, tokens, cost } => ProviderEvent::Chunk {
                        text,
                        tokens_delta: tokens,
                        cost_delta: cost,
                    },
                    ScriptStep::Wait(gate) => {
                        gate.notified().await;
                        continue;
                    }
                    ScriptStep::Complete { tokens, cost } => ProviderEvent::Complete {
                        final_tokens: tokens,
                        final_cost: cost,
                    },
                    ScriptStep::Fail(reason) => ProviderEvent::Error { reason },
                    ScriptStep::Hang => futures::future::pending().await,
                };
                return Some((event, steps));
            }
        });

        Ok(events.boxed())
    }
}
