use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use events::EventEnvelope;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::state::AppState;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;
pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Comma-separated debate IDs; events for other debates are skipped
    pub debate_ids: Option<String>,
}

/// Bounded history of bus events for `Last-Event-ID` replay.
pub struct EventBuffer {
    events: VecDeque<EventEnvelope>,
    max_size: usize,
}

impl EventBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, envelope: EventEnvelope) {
        if self.events.len() >= self.max_size {
            self.events.pop_front();
        }
        self.events.push_back(envelope);
    }

    /// Events recorded after `event_id`. Empty when the id has been evicted
    /// or was never seen.
    pub fn events_after(&self, event_id: Uuid) -> Vec<EventEnvelope> {
        match self.events.iter().position(|e| e.id == event_id) {
            Some(index) => self.events.iter().skip(index + 1).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub type SharedEventBuffer = Arc<RwLock<EventBuffer>>;

fn parse_debate_ids(debate_ids: Option<&str>) -> Option<Vec<Uuid>> {
    debate_ids.map(|s| {
        s.split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    })
}

fn matches_filter(envelope: &EventEnvelope, debate_ids: Option<&[Uuid]>) -> bool {
    match (debate_ids, envelope.event.debate_id()) {
        (Some(ids), Some(debate_id)) => ids.contains(&debate_id),
        _ => true,
    }
}

fn envelope_to_sse_event(envelope: &EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.event_type())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "SSE stream of bus events"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let debate_ids = parse_debate_ids(query.debate_ids.as_deref());
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<Uuid>().ok());

    // Subscribe before reading the buffer so nothing falls between the two.
    let rx = state.event_bus.subscribe();

    let missed_events: Vec<EventEnvelope> = match last_event_id {
        Some(event_id) => state
            .event_buffer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .events_after(event_id)
            .into_iter()
            .filter(|e| matches_filter(e, debate_ids.as_deref()))
            .collect(),
        None => Vec::new(),
    };
    let replayed_up_to = missed_events.last().map(|e| e.sequence);

    let missed_stream =
        stream::iter(missed_events.into_iter().map(|e| envelope_to_sse_event(&e)));

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| {
        let keep = match &result {
            Ok(envelope) => {
                replayed_up_to.map_or(true, |seq| envelope.sequence > seq)
                    && matches_filter(envelope, debate_ids.as_deref())
            }
            Err(e) => {
                tracing::warn!("SSE broadcast error: {:?}", e);
                false
            }
        };
        let event = match result {
            Ok(envelope) if keep => Some(envelope_to_sse_event(&envelope)),
            _ => None,
        };
        async move { event }
    });

    let stream = missed_stream.chain(live_stream);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
