use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use wayfarer_core::{
    Actor, ItineraryRequest, PaymentStatus, RequestFilter, RequestStatus, StatusHistoryEntry,
};
use wayfarer_workflow::{ConfirmPayload, Quote};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<RequestStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/requests", get(list_requests))
        .route("/v1/admin/requests/{id}", get(get_request))
        .route("/v1/admin/requests/{id}/quote", get(quote))
        .route("/v1/admin/requests/{id}/process", post(start_processing))
        .route("/v1/admin/requests/{id}/confirm", post(confirm))
        .route("/v1/admin/requests/{id}/reject", post(reject))
        .route("/v1/admin/requests/{id}/cancel", post(cancel))
        .route("/v1/admin/requests/{id}/complete", post(complete))
        .route("/v1/admin/requests/{id}/payment-status", post(record_payment_status))
        .route("/v1/admin/requests/{id}/history", get(history))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/requests
async fn list_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<ItineraryRequest>>, AppError> {
    let filter = RequestFilter {
        status: query.status,
        user_id: query.user_id,
    };
    Ok(Json(state.engine.list_requests(&actor, filter).await?))
}

/// GET /v1/admin/requests/{id}
async fn get_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.get_request(&actor, id).await?))
}

/// GET /v1/admin/requests/{id}/quote
async fn quote(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.engine.quote(&actor, id).await?))
}

/// POST /v1/admin/requests/{id}/process
async fn start_processing(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.start_processing(id, &actor).await?))
}

/// POST /v1/admin/requests/{id}/confirm
async fn confirm(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPayload>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.confirm_with_price(id, &actor, payload).await?))
}

/// POST /v1/admin/requests/{id}/reject
async fn reject(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.reject(id, &actor, req.note).await?))
}

/// POST /v1/admin/requests/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.cancel(id, &actor, req.reason).await?))
}

/// POST /v1/admin/requests/{id}/complete
async fn complete(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.complete(id, &actor).await?))
}

/// POST /v1/admin/requests/{id}/payment-status
async fn record_payment_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentStatusRequest>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(
        state
            .engine
            .record_payment_status(id, &actor, req.payment_status)
            .await?,
    ))
}

/// GET /v1/admin/requests/{id}/history
async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, AppError> {
    Ok(Json(state.engine.list_history(&actor, id).await?))
}
