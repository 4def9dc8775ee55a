//! Provider adapters: the capability of turning a prompt into a lazy stream
//! of text fragments.
//!
//! - [`ProviderAdapter`] - trait every model backend implements
//! - [`OpenRouterProvider`] - OpenAI-compatible streaming chat completions
//! - [`ScriptedProvider`] - deterministic in-memory provider for tests and demos

mod openrouter;
mod scripted;
mod types;

pub use openrouter::{OpenRouterProvider, ProviderPricing, DEFAULT_BASE_URL};
pub use scripted::{ScriptStep, ScriptedProvider};
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Finite, non-restartable stream of provider events for one turn.
///
/// Dropping the stream cancels the underlying call.
pub type ProviderStream = BoxStream<'static, ProviderEvent>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Start a streamed completion.
    ///
    /// Failures before the first byte are returned as `Err`; failures after
    /// that arrive as [`ProviderEvent::Error`] on the stream.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<ProviderStream, ProviderError>;
}
