//! The turn orchestrator.
//!
//! [`DebateOrchestrator`] owns the lifecycle of every stored debate. All
//! commands take the debate's mutex, validate against the state machine and
//! only then mutate. A turn is driven by a spawned task that pumps the
//! provider stream, applies each fragment under the mutex and relays it to
//! the caller's [`TurnStream`] and to the [`EventBus`].

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use std::time::Duration;

use events::{Event, EventBus};
use futures::{Stream, StreamExt};
use roundtable_core::{
    CreateDebateRequest, Debate, DebateState, DebateSummary, Turn, TurnSlot,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::aggregator::{estimate_tokens, CostAggregator};
use crate::error::{OrchestratorError, Result};
use crate::prompts::DebatePrompts;
use crate::provider::{CompletionRequest, ProviderAdapter, ProviderEvent};
use crate::state_machine::{DebateStateMachine, DebateTrigger};
use crate::store::{DebateStore, SharedDebate};
use crate::transcript::{DebateExport, TranscriptCompiler};

const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_TURN_CHANNEL_CAPACITY: usize = 64;
const DEBATE_REMOVED: &str = "debate removed";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for one provider call, from request to completion
    pub turn_timeout: Duration,
    /// Default for debates that do not set `auto_advance` themselves
    pub auto_advance: bool,
    pub turn_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            auto_advance: false,
            turn_channel_capacity: DEFAULT_TURN_CHANNEL_CAPACITY,
        }
    }
}

/// Events delivered to the caller that requested a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// `tokens` and `cost` are the deltas for this fragment
    Chunk {
        turn_id: Uuid,
        round: u32,
        participant_index: usize,
        text: String,
        tokens: u64,
        cost: f64,
    },
    Complete {
        turn: Turn,
    },
    Error {
        turn_id: Uuid,
        reason: String,
    },
    RoundComplete {
        round: u32,
    },
    DebateComplete {
        manual_stop: bool,
    },
}

impl TurnEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
            Self::RoundComplete { .. } => "round_complete",
            Self::DebateComplete { .. } => "debate_complete",
        }
    }
}

/// Lazy stream of [`TurnEvent`]s for a requested turn.
///
/// With auto-advance enabled the same stream carries every following turn
/// until the debate pauses, fails or completes. Dropping it does not cancel
/// the turn; the events stay visible on the bus.
#[derive(Debug)]
pub struct TurnStream {
    pub debate_id: Uuid,
    pub turn_id: Uuid,
    pub slot: TurnSlot,
    pub participant_name: String,
    events: ReceiverStream<TurnEvent>,
}

impl Stream for TurnStream {
    type Item = TurnEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

#[derive(Debug, Clone, Copy)]
struct TurnKey {
    debate_id: Uuid,
    turn_id: Uuid,
}

/// A turn registered as active and ready to be driven.
struct PreparedTurn {
    key: TurnKey,
    slot: TurnSlot,
    participant_name: String,
    request: CompletionRequest,
    token: CancellationToken,
}

enum TurnOutcome {
    Finished {
        final_tokens: Option<u64>,
        final_cost: Option<f64>,
    },
    Failed(String),
    Cancelled,
}

struct ActiveCall {
    turn_id: Uuid,
    token: CancellationToken,
}

struct Inner {
    store: Arc<dyn DebateStore>,
    provider: Arc<dyn ProviderAdapter>,
    events: EventBus,
    config: OrchestratorConfig,
    active: StdMutex<HashMap<Uuid, ActiveCall>>,
}

#[derive(Clone)]
pub struct DebateOrchestrator {
    inner: Arc<Inner>,
}

impl DebateOrchestrator {
    pub fn new(
        store: Arc<dyn DebateStore>,
        provider: Arc<dyn ProviderAdapter>,
        events: EventBus,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                provider,
                events,
                config,
                active: StdMutex::new(HashMap::new()),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn provider_name(&self) -> &str {
        self.inner.provider.name()
    }

    /// Validates and stores a new debate in `Ready`.
    ///
    /// Nothing is stored when validation fails.
    pub async fn create_debate(&self, request: CreateDebateRequest) -> Result<Debate> {
        request.validate()?;

        let mut debate = Debate::configure(request, self.inner.config.auto_advance);
        self.emit(Event::DebateCreated {
            debate_id: debate.id,
            topic: debate.topic.clone(),
        });
        self.apply(&mut debate, DebateTrigger::Create)?;

        info!(
            debate_id = %debate.id,
            participants = debate.participants.len(),
            max_rounds = debate.max_rounds,
            "Debate created"
        );

        let snapshot = debate.clone();
        self.inner
            .store
            .put(debate.id, Arc::new(tokio::sync::Mutex::new(debate)))
            .await;
        Ok(snapshot)
    }

    /// Issues the next {round, participant} slot and returns its event stream.
    ///
    /// Legal from `Ready` (which starts the debate) or from `Running` when no
    /// turn is streaming.
    pub async fn request_next_turn(&self, debate_id: Uuid) -> Result<TurnStream> {
        let shared = self.shared(debate_id).await?;

        let prepared = {
            let mut debate = shared.lock().await;
            match debate.state {
                DebateState::Ready => {
                    self.apply(&mut debate, DebateTrigger::Start)?;
                }
                DebateState::Running => {
                    if let Some(turn) = &debate.active_turn {
                        return Err(OrchestratorError::TurnInProgress {
                            debate_id,
                            turn_id: turn.id,
                        });
                    }
                }
                state => {
                    return Err(OrchestratorError::invalid_transition(state, "request a turn"))
                }
            }
            self.begin_turn(&mut debate)?
        };

        let (tx, rx) = mpsc::channel(self.inner.config.turn_channel_capacity);
        let stream = TurnStream {
            debate_id,
            turn_id: prepared.key.turn_id,
            slot: prepared.slot,
            participant_name: prepared.participant_name.clone(),
            events: ReceiverStream::new(rx),
        };

        tokio::spawn(self.clone().run_turns(shared, prepared, tx));
        Ok(stream)
    }

    /// Withholds further turns. A streaming turn is allowed to finish.
    pub async fn pause(&self, debate_id: Uuid) -> Result<Debate> {
        let shared = self.shared(debate_id).await?;
        let mut debate = shared.lock().await;
        self.apply(&mut debate, DebateTrigger::Pause)?;
        info!(debate_id = %debate_id, draining = debate.has_active_turn(), "Debate paused");
        Ok(debate.clone())
    }

    /// Returns a paused or failed debate to `Running`.
    ///
    /// Resuming from `Error` clears `last_error`; the failed slot is only
    /// retried by an explicit [`request_next_turn`](Self::request_next_turn).
    pub async fn resume(&self, debate_id: Uuid) -> Result<Debate> {
        let shared = self.shared(debate_id).await?;

        let (snapshot, prepared) = {
            let mut debate = shared.lock().await;
            let from = debate.state;
            self.apply(&mut debate, DebateTrigger::Resume)?;
            if from == DebateState::Error {
                debate.last_error = None;
            }

            let prepared = if from == DebateState::Paused
                && debate.auto_advance
                && !debate.has_active_turn()
            {
                Some(self.begin_turn(&mut debate)?)
            } else {
                None
            };
            info!(debate_id = %debate_id, from = %from, "Debate resumed");
            (debate.clone(), prepared)
        };

        if let Some(prepared) = prepared {
            // Nobody listens on this channel; the bus carries the events.
            let (tx, _) = mpsc::channel(1);
            tokio::spawn(self.clone().run_turns(shared, prepared, tx));
        }

        Ok(snapshot)
    }

    /// Completes the debate immediately, cancelling any in-flight call.
    pub async fn stop(&self, debate_id: Uuid) -> Result<Debate> {
        let shared = self.shared(debate_id).await?;
        let mut debate = shared.lock().await;

        let to = DebateStateMachine::next_state(debate.state, DebateTrigger::Stop)?;
        debate.manually_stopped = true;
        if let Some(mut turn) = debate.active_turn.take() {
            CostAggregator::discard(&mut turn, "stopped by user");
            self.emit(Event::TurnFailed {
                debate_id,
                turn_id: turn.id,
                round: turn.round,
                participant_index: turn.participant_index,
                reason: "stopped by user".to_string(),
            });
            debate.abandoned_turn = Some(turn);
        }
        self.cancel_call(debate_id);
        self.transition(&mut debate, to, DebateTrigger::Stop);
        self.emit(Event::DebateCompleted {
            debate_id,
            manual_stop: true,
        });

        info!(debate_id = %debate_id, "Debate stopped by user");
        Ok(debate.clone())
    }

    pub async fn get_debate(&self, debate_id: Uuid) -> Result<Debate> {
        let shared = self.shared(debate_id).await?;
        let debate = shared.lock().await;
        Ok(debate.clone())
    }

    /// Summaries of all stored debates, most recently updated first.
    pub async fn list_debates(&self) -> Vec<DebateSummary> {
        let mut summaries = Vec::new();
        for shared in self.inner.store.list().await {
            let debate = shared.lock().await;
            summaries.push(DebateSummary::from(&*debate));
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    pub async fn summary(&self, debate_id: Uuid) -> Result<DebateExport> {
        let debate = self.get_debate(debate_id).await?;
        TranscriptCompiler::summarize(&debate)
    }

    /// Drops a debate, cancelling its in-flight call if there is one.
    pub async fn remove_debate(&self, debate_id: Uuid) -> Result<()> {
        self.inner
            .store
            .remove(debate_id)
            .await
            .ok_or(OrchestratorError::NotFound(debate_id))?;
        self.cancel_call(debate_id);
        self.emit(Event::DebateRemoved { debate_id });
        info!(debate_id = %debate_id, "Debate removed");
        Ok(())
    }

    /// Evicts debates idle for at least `ttl`. Returns the evicted ids.
    pub async fn evict_expired(&self, ttl: Duration) -> Vec<Uuid> {
        let evicted = self.inner.store.evict_idle(ttl).await;
        for debate_id in &evicted {
            self.emit(Event::DebateRemoved {
                debate_id: *debate_id,
            });
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted idle debates");
        }
        evicted
    }

    async fn shared(&self, debate_id: Uuid) -> Result<SharedDebate> {
        self.inner
            .store
            .get(debate_id)
            .await
            .ok_or(OrchestratorError::NotFound(debate_id))
    }

    fn emit(&self, event: Event) {
        self.inner.events.emit(event);
    }

    /// Validates `trigger` against the current state and applies it.
    fn apply(&self, debate: &mut Debate, trigger: DebateTrigger) -> Result<()> {
        let to = DebateStateMachine::next_state(debate.state, trigger)?;
        self.transition(debate, to, trigger);
        Ok(())
    }

    fn transition(&self, debate: &mut Debate, to: DebateState, trigger: DebateTrigger) {
        let from = debate.state;
        if from == to {
            return;
        }
        debate.state = to;
        debate.touch();
        debug!(debate_id = %debate.id, from = %from, to = %to, trigger = trigger.as_str(), "State transition");
        self.emit(Event::DebateStateChanged {
            debate_id: debate.id,
            from_state: from.as_str().to_string(),
            to_state: to.as_str().to_string(),
            reason: trigger.as_str().to_string(),
        });
    }

    /// Marks the next slot active and registers its cancellation token.
    fn begin_turn(&self, debate: &mut Debate) -> Result<PreparedTurn> {
        let slot = debate.next_slot().ok_or_else(|| {
            OrchestratorError::invariant(format!(
                "debate {} is {} with no remaining slot",
                debate.id, debate.state
            ))
        })?;
        let participant = debate
            .participant(slot.participant_index)
            .cloned()
            .ok_or_else(|| {
                OrchestratorError::invariant(format!(
                    "slot {:?} names a missing participant",
                    slot
                ))
            })?;

        let request = DebatePrompts::completion_request(debate, &participant, slot);
        let turn = Turn::start(slot, participant.name.clone());
        let key = TurnKey {
            debate_id: debate.id,
            turn_id: turn.id,
        };
        debate.active_turn = Some(turn);
        debate.touch();

        let token = CancellationToken::new();
        self.lock_active().insert(
            key.debate_id,
            ActiveCall {
                turn_id: key.turn_id,
                token: token.clone(),
            },
        );

        self.emit(Event::TurnStarted {
            debate_id: key.debate_id,
            turn_id: key.turn_id,
            round: slot.round,
            participant_index: slot.participant_index,
            participant_name: participant.name.clone(),
        });
        info!(
            debate_id = %key.debate_id,
            round = slot.round,
            participant = %participant.name,
            model = %participant.model,
            "Turn started"
        );

        Ok(PreparedTurn {
            key,
            slot,
            participant_name: participant.name,
            request,
            token,
        })
    }

    /// Drives turns until one ends without scheduling a successor.
    async fn run_turns(
        self,
        shared: SharedDebate,
        mut prepared: PreparedTurn,
        tx: mpsc::Sender<TurnEvent>,
    ) {
        loop {
            match self.drive_turn(&shared, prepared, &tx).await {
                Some(next) => prepared = next,
                None => break,
            }
        }
    }

    async fn drive_turn(
        &self,
        shared: &SharedDebate,
        prepared: PreparedTurn,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Option<PreparedTurn> {
        let PreparedTurn {
            key,
            request,
            token,
            ..
        } = prepared;
        let turn_timeout = self.inner.config.turn_timeout;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => TurnOutcome::Cancelled,
            result = tokio::time::timeout(turn_timeout, self.pump(shared, key, request, tx)) => {
                match result {
                    Ok(outcome) => outcome,
                    Err(_) => TurnOutcome::Failed(format!(
                        "timed out after {}s",
                        turn_timeout.as_secs()
                    )),
                }
            }
        };
        self.clear_call(key);

        match outcome {
            TurnOutcome::Finished {
                final_tokens,
                final_cost,
            } => self.finish_turn(shared, key, final_tokens, final_cost, tx).await,
            TurnOutcome::Failed(reason) => {
                let event = {
                    let mut debate = shared.lock().await;
                    self.fail_turn(&mut debate, key, reason)
                        .or_else(|| Self::superseded(&debate, key))
                };
                if let Some(event) = event {
                    let _ = tx.send(event).await;
                }
                None
            }
            TurnOutcome::Cancelled => {
                debug!(debate_id = %key.debate_id, turn_id = %key.turn_id, "Turn cancelled");
                let event = {
                    let debate = shared.lock().await;
                    Self::superseded(&debate, key).unwrap_or_else(|| TurnEvent::Error {
                        turn_id: key.turn_id,
                        reason: DEBATE_REMOVED.to_string(),
                    })
                };
                let _ = tx.send(event).await;
                None
            }
        }
    }

    /// Closing event for a turn whose debate was stopped under it.
    fn superseded(debate: &Debate, key: TurnKey) -> Option<TurnEvent> {
        let still_active = debate.active_turn.as_ref().map(|t| t.id) == Some(key.turn_id);
        (debate.manually_stopped && !still_active)
            .then_some(TurnEvent::DebateComplete { manual_stop: true })
    }

    /// Reads the provider stream, applying each fragment in order.
    async fn pump(
        &self,
        shared: &SharedDebate,
        key: TurnKey,
        request: CompletionRequest,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        let mut stream = match self.inner.provider.stream_completion(request).await {
            Ok(stream) => stream,
            Err(err) => return TurnOutcome::Failed(err.to_string()),
        };

        while let Some(event) = stream.next().await {
            match event {
                ProviderEvent::Chunk {
                    text,
                    tokens_delta,
                    cost_delta,
                } => {
                    let tokens = tokens_delta.unwrap_or_else(|| estimate_tokens(&text));
                    let cost = cost_delta.unwrap_or(0.0);
                    let applied = {
                        let mut debate = shared.lock().await;
                        self.apply_chunk(&mut debate, key, text, tokens, cost)
                    };
                    match applied {
                        Ok(Some(event)) => {
                            let _ = tx.send(event).await;
                        }
                        Ok(None) => return TurnOutcome::Cancelled,
                        Err(err) => {
                            self.report_invariant(key, "Failed to apply chunk", &err);
                            return TurnOutcome::Failed(err.to_string());
                        }
                    }
                }
                ProviderEvent::Complete {
                    final_tokens,
                    final_cost,
                } => {
                    return TurnOutcome::Finished {
                        final_tokens,
                        final_cost,
                    }
                }
                ProviderEvent::Error { reason } => return TurnOutcome::Failed(reason),
            }
        }

        TurnOutcome::Failed("provider stream ended without completion".to_string())
    }

    /// Returns `None` when the turn is no longer the active one.
    fn apply_chunk(
        &self,
        debate: &mut Debate,
        key: TurnKey,
        text: String,
        tokens: u64,
        cost: f64,
    ) -> Result<Option<TurnEvent>> {
        if debate.active_turn.as_ref().map(|t| t.id) != Some(key.turn_id) {
            return Ok(None);
        }
        DebateStateMachine::next_state(debate.state, DebateTrigger::StreamChunk)?;

        let Some(turn) = debate.active_turn.as_mut() else {
            return Ok(None);
        };
        let cost_before = turn.cost;
        CostAggregator::apply_chunk(&mut debate.metrics, turn, &text, tokens, cost)?;
        let applied_cost = turn.cost - cost_before;
        let (round, participant_index) = (turn.round, turn.participant_index);
        debate.touch();

        self.emit(Event::TurnChunk {
            debate_id: key.debate_id,
            turn_id: key.turn_id,
            round,
            participant_index,
            text: text.clone(),
            tokens,
            cost: applied_cost,
        });
        self.check_cost_warning(debate);

        Ok(Some(TurnEvent::Chunk {
            turn_id: key.turn_id,
            round,
            participant_index,
            text,
            tokens,
            cost: applied_cost,
        }))
    }

    fn check_cost_warning(&self, debate: &mut Debate) {
        let Some(threshold) = debate.cost_warning_threshold else {
            return;
        };
        if debate.cost_warning_triggered || debate.metrics.total_cost < threshold {
            return;
        }
        debate.cost_warning_triggered = true;
        warn!(
            debate_id = %debate.id,
            total_cost = debate.metrics.total_cost,
            threshold,
            "Debate cost crossed warning threshold"
        );
        self.emit(Event::CostWarning {
            debate_id: debate.id,
            total_cost: debate.metrics.total_cost,
            threshold,
        });
    }

    async fn finish_turn(
        &self,
        shared: &SharedDebate,
        key: TurnKey,
        final_tokens: Option<u64>,
        final_cost: Option<f64>,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Option<PreparedTurn> {
        let (events, next) = {
            let mut debate = shared.lock().await;
            match self.record_completion(&mut debate, key, final_tokens, final_cost) {
                Ok(recorded) => recorded,
                Err(err) => {
                    self.report_invariant(key, "Failed to record finished turn", &err);
                    let event = self.fail_turn(&mut debate, key, err.to_string());
                    (event.into_iter().collect(), None)
                }
            }
        };

        for event in events {
            let _ = tx.send(event).await;
        }
        next
    }

    /// Finalizes the active turn, appends it to its round and decides what
    /// comes next.
    fn record_completion(
        &self,
        debate: &mut Debate,
        key: TurnKey,
        final_tokens: Option<u64>,
        final_cost: Option<f64>,
    ) -> Result<(Vec<TurnEvent>, Option<PreparedTurn>)> {
        let mut events = Vec::new();
        if debate.active_turn.as_ref().map(|t| t.id) != Some(key.turn_id) {
            events.extend(Self::superseded(debate, key));
            return Ok((events, None));
        }

        let to = DebateStateMachine::next_state(debate.state, DebateTrigger::StreamComplete)?;
        if let Some(turn) = debate.active_turn.as_mut() {
            CostAggregator::finalize(&mut debate.metrics, turn, final_tokens, final_cost)?;
        }
        self.transition(debate, to, DebateTrigger::StreamComplete);
        self.check_cost_warning(debate);

        let turn = debate
            .active_turn
            .take()
            .ok_or_else(|| OrchestratorError::invariant("active turn vanished while recording"))?;
        let recorded = debate.record_turn(turn.clone())?;

        info!(
            debate_id = %key.debate_id,
            round = turn.round,
            participant = %turn.participant_name,
            tokens = turn.tokens,
            cost = turn.cost,
            latency_ms = turn.latency_ms,
            "Turn completed"
        );
        self.emit(Event::TurnCompleted {
            debate_id: key.debate_id,
            turn_id: turn.id,
            round: turn.round,
            participant_index: turn.participant_index,
            tokens: turn.tokens,
            cost: turn.cost,
            latency_ms: turn.latency_ms,
        });
        events.push(TurnEvent::Complete { turn });

        if recorded.round_completed {
            self.emit(Event::RoundCompleted {
                debate_id: key.debate_id,
                round: recorded.round,
            });
            events.push(TurnEvent::RoundComplete {
                round: recorded.round,
            });
        }

        let trigger = DebateTrigger::AutoAdvance {
            debate_finished: recorded.debate_finished,
        };
        let to = DebateStateMachine::next_state(debate.state, trigger)?;
        self.transition(debate, to, trigger);

        if to == DebateState::Completed {
            info!(debate_id = %key.debate_id, total_cost = debate.metrics.total_cost, "Debate completed");
            self.emit(Event::DebateCompleted {
                debate_id: key.debate_id,
                manual_stop: false,
            });
            events.push(TurnEvent::DebateComplete { manual_stop: false });
            return Ok((events, None));
        }

        if to == DebateState::Running && debate.auto_advance {
            let next = self.begin_turn(debate)?;
            return Ok((events, Some(next)));
        }
        Ok((events, None))
    }

    /// Moves the debate to `Error` and discards the turn.
    ///
    /// Returns `None` when the failure no longer applies, e.g. after a stop.
    fn fail_turn(&self, debate: &mut Debate, key: TurnKey, reason: String) -> Option<TurnEvent> {
        let to = DebateStateMachine::next_state(debate.state, DebateTrigger::ProviderError).ok()?;

        let active = debate.active_turn.as_ref().map(|t| t.id) == Some(key.turn_id);
        if active {
            if let Some(mut turn) = debate.active_turn.take() {
                CostAggregator::discard(&mut turn, reason.clone());
                self.emit(Event::TurnFailed {
                    debate_id: key.debate_id,
                    turn_id: turn.id,
                    round: turn.round,
                    participant_index: turn.participant_index,
                    reason: reason.clone(),
                });
                debate.abandoned_turn = Some(turn);
            }
        } else if debate.state != DebateState::CheckingProgress {
            return None;
        }

        warn!(debate_id = %key.debate_id, turn_id = %key.turn_id, reason = %reason, "Turn failed");
        debate.last_error = Some(reason.clone());
        self.transition(debate, to, DebateTrigger::ProviderError);

        Some(TurnEvent::Error {
            turn_id: key.turn_id,
            reason,
        })
    }

    /// Logs a broken invariant and publishes it as a bus `error` event.
    fn report_invariant(&self, key: TurnKey, what: &str, err: &OrchestratorError) {
        error!(
            debate_id = %key.debate_id,
            turn_id = %key.turn_id,
            error = %err,
            "{}", what
        );
        self.emit(Event::Error {
            message: format!("{}: {}", what, err),
            context: Some(format!("debate {} turn {}", key.debate_id, key.turn_id)),
        });
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ActiveCall>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_call(&self, key: TurnKey) {
        let mut active = self.lock_active();
        if active.get(&key.debate_id).map(|c| c.turn_id) == Some(key.turn_id) {
            active.remove(&key.debate_id);
        }
    }

    fn cancel_call(&self, debate_id: Uuid) {
        if let Some(call) = self.lock_active().remove(&debate_id) {
            debug!(debate_id = %debate_id, turn_id = %call.turn_id, "Cancelling in-flight call");
            call.token.cancel();
        }
    }
}
