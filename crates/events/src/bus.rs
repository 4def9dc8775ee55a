//! Event bus implementation using tokio broadcast channels

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Event bus for publishing and subscribing to debate events
///
/// Every published envelope is stamped with a bus-wide sequence number, so
/// subscribers can order events even when they arrive through different
/// channels (SSE replay buffer vs. live stream).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wrap an event in a sequenced envelope and publish it.
    ///
    /// Returns the number of subscribers that received the event; 0 means
    /// nobody was listening and the event was dropped.
    pub fn emit(&self, event: Event) -> usize {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.publish(EventEnvelope::new(event).with_sequence(sequence))
    }

    /// Publish an already-built envelope to all subscribers
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Subscribe to every event on the bus
    ///
    /// Events published before subscribing are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of events emitted through [`EventBus::emit`]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("event_count", &self.event_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn created(debate_id: Uuid) -> Event {
        Event::DebateCreated {
            debate_id,
            topic: "Test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let debate_id = Uuid::new_v4();
        let sent = bus.emit(created(debate_id));
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.debate_id(), Some(debate_id));
        assert_eq!(received.sequence, 0);
    }

    #[tokio::test]
    async fn test_sequence_increments() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(created(Uuid::new_v4()));
        bus.emit(created(Uuid::new_v4()));
        assert_eq!(bus.event_count(), 2);

        assert_eq!(rx.recv().await.unwrap().sequence, 0);
        assert_eq!(rx.recv().await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();

        // No subscribers, event is dropped
        let sent = bus.emit(created(Uuid::new_v4()));
        assert_eq!(sent, 0);
        assert_eq!(bus.event_count(), 1);
    }

    #[test]
    fn test_clone_shares_channel_and_sequence() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus2.subscribe();
        assert_eq!(bus1.subscriber_count(), 1);

        bus1.emit(created(Uuid::new_v4()));
        assert_eq!(bus2.event_count(), 1);
    }
}
