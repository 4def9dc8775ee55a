pub mod aggregator;
pub mod engine;
pub mod error;
pub mod prompts;
pub mod provider;
pub mod state_machine;
pub mod store;
pub mod transcript;

pub use aggregator::{estimate_tokens, CostAggregator};
pub use engine::{DebateOrchestrator, OrchestratorConfig, TurnEvent, TurnStream};
pub use error::{OrchestratorError, Result};
pub use provider::{OpenRouterProvider, ProviderAdapter, ProviderPricing, ScriptStep, ScriptedProvider};
pub use state_machine::{DebateStateMachine, DebateTrigger};
pub use store::{DebateStore, InMemoryDebateStore, SharedDebate};
pub use transcript::{DebateExport, DebateTranscript, TranscriptCompiler};
