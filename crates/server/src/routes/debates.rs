use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{Stream, StreamExt};
use orchestrator::{DebateExport, DebateStateMachine, TurnEvent};
use roundtable_core::{CreateDebateRequest, Debate, DebateSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::sse::SSE_KEEP_ALIVE_INTERVAL;
use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

/// Debate snapshot plus the commands its current state accepts.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DebateResponse {
    #[serde(flatten)]
    pub debate: Debate,
    pub available_commands: Vec<String>,
}

impl From<Debate> for DebateResponse {
    fn from(debate: Debate) -> Self {
        let available_commands = DebateStateMachine::available_commands(debate.state)
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            debate,
            available_commands,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/debates",
    responses(
        (status = 200, description = "All debates in memory", body = Vec<DebateSummary>),
    ),
    tag = "debates"
)]
pub async fn list_debates(State(state): State<AppState>) -> Json<Vec<DebateSummary>> {
    Json(state.orchestrator.list_debates().await)
}

#[utoipa::path(
    post,
    path = "/api/debates",
    request_body = CreateDebateRequest,
    responses(
        (status = 201, description = "Debate created in ready state", body = DebateResponse),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn create_debate(
    State(state): State<AppState>,
    Json(payload): Json<CreateDebateRequest>,
) -> Result<(StatusCode, Json<DebateResponse>), AppError> {
    let debate = state.orchestrator.create_debate(payload).await?;
    Ok((StatusCode::CREATED, Json(debate.into())))
}

#[utoipa::path(
    get,
    path = "/api/debates/{id}",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "Debate snapshot", body = DebateResponse),
        (status = 404, description = "Debate not found", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn get_debate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DebateResponse>, AppError> {
    let debate = state.orchestrator.get_debate(id).await?;
    Ok(Json(debate.into()))
}

#[utoipa::path(
    delete,
    path = "/api/debates/{id}",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 204, description = "Debate removed"),
        (status = 404, description = "Debate not found", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn delete_debate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.orchestrator.remove_debate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn turn_event_to_sse_event(event: &TurnEvent, seq: u64) -> Result<Event, Infallible> {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(seq.to_string())
        .event(event.event_type())
        .data(data))
}

#[utoipa::path(
    post,
    path = "/api/debates/{id}/turns",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "SSE stream of turn events (chunk, complete, error, round_complete, debate_complete)"),
        (status = 404, description = "Debate not found", body = ErrorResponse),
        (status = 409, description = "Debate state does not allow a new turn", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn next_turn(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let turn = state.orchestrator.request_next_turn(id).await?;
    tracing::debug!(
        debate_id = %id,
        turn_id = %turn.turn_id,
        participant = %turn.participant_name,
        "Streaming turn over SSE"
    );

    let stream = turn
        .enumerate()
        .map(|(seq, event)| turn_event_to_sse_event(&event, seq as u64));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/debates/{id}/pause",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "Debate paused", body = DebateResponse),
        (status = 404, description = "Debate not found", body = ErrorResponse),
        (status = 409, description = "Invalid transition", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn pause_debate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DebateResponse>, AppError> {
    let debate = state.orchestrator.pause(id).await?;
    Ok(Json(debate.into()))
}

#[utoipa::path(
    post,
    path = "/api/debates/{id}/resume",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "Debate running again", body = DebateResponse),
        (status = 404, description = "Debate not found", body = ErrorResponse),
        (status = 409, description = "Invalid transition", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn resume_debate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DebateResponse>, AppError> {
    let debate = state.orchestrator.resume(id).await?;
    Ok(Json(debate.into()))
}

#[utoipa::path(
    post,
    path = "/api/debates/{id}/stop",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "Debate completed by manual stop", body = DebateResponse),
        (status = 404, description = "Debate not found", body = ErrorResponse),
        (status = 409, description = "Debate already completed", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn stop_debate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DebateResponse>, AppError> {
    let debate = state.orchestrator.stop(id).await?;
    Ok(Json(debate.into()))
}

#[utoipa::path(
    get,
    path = "/api/debates/{id}/summary",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "Structured transcript and markdown", body = DebateExport),
        (status = 404, description = "Debate not found", body = ErrorResponse),
        (status = 409, description = "No completed turns yet", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DebateExport>, AppError> {
    let export = state.orchestrator.summary(id).await?;
    Ok(Json(export))
}

#[utoipa::path(
    get,
    path = "/api/debates/{id}/export.md",
    params(("id" = Uuid, Path, description = "Debate ID")),
    responses(
        (status = 200, description = "Markdown transcript", content_type = "text/markdown"),
        (status = 404, description = "Debate not found", body = ErrorResponse),
        (status = 409, description = "No completed turns yet", body = ErrorResponse),
    ),
    tag = "debates"
)]
pub async fn export_markdown(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let export = state.orchestrator.summary(id).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        export.markdown,
    ))
}
