use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use wayfarer_core::{
    Actor, CustomerNotification, ItineraryRequest, NewItineraryRequest, RequestFilter,
    RequestStatus, StatusHistoryEntry,
};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MyRequestsQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(submit).get(my_requests))
        .route("/v1/requests/{id}", get(get_request))
        .route("/v1/requests/{id}/cancel", post(cancel))
        .route("/v1/requests/{id}/history", get(history))
        .route("/v1/notifications", get(notifications))
        .route("/v1/notifications/{id}/read", post(mark_read))
}

/// POST /v1/requests
async fn submit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<NewItineraryRequest>,
) -> Result<(StatusCode, Json<ItineraryRequest>), AppError> {
    let request = state.engine.submit(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /v1/requests
async fn my_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<MyRequestsQuery>,
) -> Result<Json<Vec<ItineraryRequest>>, AppError> {
    let filter = RequestFilter {
        status: query.status,
        ..RequestFilter::for_user(actor.id)
    };
    Ok(Json(state.engine.list_requests(&actor, filter).await?))
}

/// GET /v1/requests/{id}
async fn get_request(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.get_request(&actor, id).await?))
}

/// POST /v1/requests/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ItineraryRequest>, AppError> {
    Ok(Json(state.engine.cancel(id, &actor, req.reason).await?))
}

/// GET /v1/requests/{id}/history
async fn history(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusHistoryEntry>>, AppError> {
    Ok(Json(state.engine.list_history(&actor, id).await?))
}

/// GET /v1/notifications
async fn notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Vec<CustomerNotification>>, AppError> {
    Ok(Json(
        state
            .engine
            .list_notifications(&actor, actor.id, query.unread_only)
            .await?,
    ))
}

/// POST /v1/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.mark_notification_read(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
