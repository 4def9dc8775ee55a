pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roundtable API",
        version = "0.1.0",
        description = "Sequential multi-model debate orchestration"
    ),
    paths(
        routes::health_check,
        routes::list_debates,
        routes::create_debate,
        routes::get_debate,
        routes::delete_debate,
        routes::next_turn,
        routes::pause_debate,
        routes::resume_debate,
        routes::stop_debate,
        routes::get_summary,
        routes::export_markdown,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::DebateResponse,
        error::ErrorResponse,
        roundtable_core::CreateDebateRequest,
        roundtable_core::Debate,
        roundtable_core::DebateSummary,
        roundtable_core::DebateState,
        roundtable_core::Participant,
        roundtable_core::Round,
        roundtable_core::Turn,
        roundtable_core::TurnStatus,
        roundtable_core::Metrics,
        roundtable_core::ParticipantMetrics,
        orchestrator::TurnEvent,
        orchestrator::DebateExport,
        orchestrator::DebateTranscript,
        events::EventEnvelope,
        events::Event,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "debates", description = "Debate lifecycle and turn streaming"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route(
            "/api/debates",
            get(routes::list_debates).post(routes::create_debate),
        )
        .route(
            "/api/debates/{id}",
            get(routes::get_debate).delete(routes::delete_debate),
        )
        .route("/api/debates/{id}/turns", post(routes::next_turn))
        .route("/api/debates/{id}/pause", post(routes::pause_debate))
        .route("/api/debates/{id}/resume", post(routes::resume_debate))
        .route("/api/debates/{id}/stop", post(routes::stop_debate))
        .route("/api/debates/{id}/summary", get(routes::get_summary))
        .route("/api/debates/{id}/export.md", get(routes::export_markdown))
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
