use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;
use wayfarer_workflow::{SideEffect, WorkflowError};

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    AuthorizationError(String),
    NotFoundError(String),
    ConflictError(String),
    UnavailableError(String),
    /// The status moved but a dependent write did not.
    PartialFailure {
        request_id: Uuid,
        step: SideEffect,
        reason: String,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::UnavailableError(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Service temporarily unavailable" }),
                )
            }
            AppError::PartialFailure {
                request_id,
                step,
                reason,
            } => {
                tracing::error!(%request_id, %step, "Partial failure: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Request updated but a follow-up step failed",
                        "code": "partial_failure",
                        "request_id": request_id,
                        "step": step.to_string(),
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => AppError::ValidationError(msg),
            WorkflowError::Authorization(msg) => AppError::AuthorizationError(msg),
            WorkflowError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            conflict @ WorkflowError::Conflict { .. } => AppError::ConflictError(conflict.to_string()),
            WorkflowError::Persistence(msg) => AppError::UnavailableError(msg),
            WorkflowError::PartialFailure {
                request_id,
                step,
                reason,
                ..
            } => AppError::PartialFailure {
                request_id,
                step,
                reason,
            },
        }
    }
}
