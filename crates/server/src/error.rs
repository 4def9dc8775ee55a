use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(_) => AppError::BadRequest(err.to_string()),
            OrchestratorError::NotFound(_) => AppError::NotFound(err.to_string()),
            OrchestratorError::InvalidTransition { .. }
            | OrchestratorError::TurnInProgress { .. }
            | OrchestratorError::NoCompletedTurns(_) => AppError::Conflict(err.to_string()),
            OrchestratorError::InvariantViolation(_) => {
                tracing::error!("Orchestrator invariant violated: {}", err);
                AppError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_core::DebateState;
    use uuid::Uuid;

    fn status_of(err: OrchestratorError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(OrchestratorError::Validation("rounds".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::NotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrchestratorError::invalid_transition(
                DebateState::Completed,
                "pause"
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrchestratorError::TurnInProgress {
                debate_id: Uuid::new_v4(),
                turn_id: Uuid::new_v4(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrchestratorError::NoCompletedTurns(Uuid::new_v4())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrchestratorError::invariant("two active turns")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
