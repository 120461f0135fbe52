use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use leasing_core::workflows::inventory::Offer;
use leasing_core::workflows::pricing::{
    score_listing, select_best_offer, ListingScore, OfferTarget, PricingConfig,
};
use leasing_core::workflows::reconciliation::{
    extraction_router, ExtractionService, InventoryStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    #[serde(default)]
    pub(crate) retail_price: Option<u32>,
    pub(crate) offers: Vec<Offer>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) score: ListingScore,
    pub(crate) total_score: u8,
    pub(crate) display_offer: Option<Offer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelectRequest {
    pub(crate) offers: Vec<Offer>,
    #[serde(default)]
    pub(crate) mileage: Option<u32>,
    #[serde(default)]
    pub(crate) deposit: Option<u32>,
    #[serde(default)]
    pub(crate) term: Option<u32>,
    #[serde(default)]
    pub(crate) strict: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SelectResponse {
    pub(crate) target: OfferTarget,
    pub(crate) offer: Option<Offer>,
}

pub(crate) fn with_app_routes<S>(service: Arc<ExtractionService<S>>) -> axum::Router
where
    S: InventoryStore + 'static,
{
    extraction_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/pricing/score", axum::routing::post(score_endpoint))
        .route(
            "/api/v1/pricing/select",
            axum::routing::post(select_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Score every offer of an ad-hoc listing and report the one the marketplace would display.
pub(crate) async fn score_endpoint(
    Extension(config): Extension<Arc<PricingConfig>>,
    Json(payload): Json<ScoreRequest>,
) -> Json<ScoreResponse> {
    let score = score_listing(payload.retail_price, &payload.offers, &config);
    let display_offer =
        select_best_offer(&payload.offers, &OfferTarget::from_config(&config), false).copied();

    Json(ScoreResponse {
        total_score: score.total_score(),
        score,
        display_offer,
    })
}

/// Pick one offer for a target configuration. Missing target fields fall back to the defaults.
pub(crate) async fn select_endpoint(
    Extension(config): Extension<Arc<PricingConfig>>,
    Json(payload): Json<SelectRequest>,
) -> Json<SelectResponse> {
    let defaults = OfferTarget::from_config(&config);
    let target = OfferTarget {
        mileage: payload.mileage.unwrap_or(defaults.mileage),
        deposit: payload.deposit.unwrap_or(defaults.deposit),
        term: payload.term.or(defaults.term),
    };
    let offer = select_best_offer(&payload.offers, &target, payload.strict).copied();

    Json(SelectResponse { target, offer })
}
