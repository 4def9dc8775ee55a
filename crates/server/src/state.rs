use std::sync::{Arc, RwLock};

use events::EventBus;
use orchestrator::{DebateOrchestrator, InMemoryDebateStore, OrchestratorConfig, ProviderAdapter};
use tokio::sync::broadcast::error::RecvError;

use crate::routes::sse::{EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: DebateOrchestrator,
    pub event_bus: EventBus,
    pub event_buffer: SharedEventBuffer,
}

impl AppState {
    /// Must be called inside a tokio runtime: it spawns the task that fills
    /// the SSE replay buffer.
    pub fn new(orchestrator: DebateOrchestrator) -> Self {
        let event_bus = orchestrator.events().clone();
        let event_buffer = Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE)));

        spawn_event_recorder(&event_bus, Arc::clone(&event_buffer));

        Self {
            orchestrator,
            event_bus,
            event_buffer,
        }
    }

    /// State backed by an in-memory store and a fresh event bus.
    pub fn with_provider(provider: Arc<dyn ProviderAdapter>, config: OrchestratorConfig) -> Self {
        Self::with_event_bus(provider, config, EventBus::new())
    }

    pub fn with_event_bus(
        provider: Arc<dyn ProviderAdapter>,
        config: OrchestratorConfig,
        event_bus: EventBus,
    ) -> Self {
        let orchestrator = DebateOrchestrator::new(
            Arc::new(InMemoryDebateStore::new()),
            provider,
            event_bus,
            config,
        );
        Self::new(orchestrator)
    }
}

fn spawn_event_recorder(event_bus: &EventBus, buffer: SharedEventBuffer) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => buffer
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event recorder lagged, replay buffer has gaps");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
