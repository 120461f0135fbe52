use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ChangeId, SessionId};
use super::repository::{InventoryStore, StoreError};
use super::service::{ExtractionService, ExtractionServiceError};
use crate::workflows::inventory::DealerId;

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    /// Decoded per element during intake; a badly typed record is rejected on its own.
    pub vehicles: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub selected_change_ids: Vec<ChangeId>,
    pub applied_by: String,
    /// Optional budget for the whole call; unprocessed changes stay pending.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeIdsRequest {
    pub change_ids: Vec<ChangeId>,
}

/// Router builder exposing staging, review and apply endpoints.
pub fn extraction_router<S>(service: Arc<ExtractionService<S>>) -> Router
where
    S: InventoryStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/dealers/:dealer_id/extractions",
            post(stage_handler::<S>),
        )
        .route(
            "/api/v1/dealers/:dealer_id/scores",
            get(dealer_scores_handler::<S>),
        )
        .route(
            "/api/v1/extractions/:session_id",
            get(session_handler::<S>),
        )
        .route(
            "/api/v1/extractions/:session_id/apply",
            post(apply_handler::<S>),
        )
        .route(
            "/api/v1/extractions/:session_id/reset",
            post(reset_handler::<S>),
        )
        .route(
            "/api/v1/extractions/:session_id/discard",
            post(discard_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn stage_handler<S>(
    State(service): State<Arc<ExtractionService<S>>>,
    Path(dealer_id): Path<String>,
    axum::Json(request): axum::Json<StageRequest>,
) -> Response
where
    S: InventoryStore + 'static,
{
    match service.stage(&DealerId(dealer_id), request.vehicles).await {
        Ok(staged) => (StatusCode::CREATED, axum::Json(staged)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn session_handler<S>(
    State(service): State<Arc<ExtractionService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: InventoryStore + 'static,
{
    match service.session(&SessionId(session_id)).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn apply_handler<S>(
    State(service): State<Arc<ExtractionService<S>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<ApplyRequest>,
) -> Response
where
    S: InventoryStore + 'static,
{
    let applied_by = request.applied_by.trim();
    if applied_by.is_empty() {
        let payload = json!({ "error": "applied_by is required" });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }
    let deadline = request
        .timeout_ms
        .map(|millis| Instant::now() + Duration::from_millis(millis));

    match service
        .apply(
            &SessionId(session_id),
            &request.selected_change_ids,
            applied_by,
            deadline,
        )
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reset_handler<S>(
    State(service): State<Arc<ExtractionService<S>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<ChangeIdsRequest>,
) -> Response
where
    S: InventoryStore + 'static,
{
    match service
        .reset(&SessionId(session_id), &request.change_ids)
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn discard_handler<S>(
    State(service): State<Arc<ExtractionService<S>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<ChangeIdsRequest>,
) -> Response
where
    S: InventoryStore + 'static,
{
    match service
        .discard(&SessionId(session_id), &request.change_ids)
        .await
    {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dealer_scores_handler<S>(
    State(service): State<Arc<ExtractionService<S>>>,
    Path(dealer_id): Path<String>,
) -> Response
where
    S: InventoryStore + 'static,
{
    match service.dealer_scores(&DealerId(dealer_id)).await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ExtractionServiceError) -> Response {
    let status = match &err {
        err if err.is_not_found() => StatusCode::NOT_FOUND,
        ExtractionServiceError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
