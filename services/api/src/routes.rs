use crate::infra::{AppState, InMemoryIdentityDirectory, ServiceMachine};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;
use std::sync::Arc;
use talent_match::error::AppError;
use talent_match::workflows::hiring::{
    pipeline_router, AnonId, CandidateIdentity,
};
use tracing::info;

pub(crate) fn with_pipeline_routes(
    machine: Arc<ServiceMachine>,
    directory: InMemoryIdentityDirectory,
) -> axum::Router {
    pipeline_router(machine)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/candidates/:anon_id/identity",
            axum::routing::put(register_identity_endpoint),
        )
        .layer(Extension(directory))
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

/// Stores the PII behind an anonymized id. Nothing here is readable until the
/// candidate consents on a specific entry.
pub(crate) async fn register_identity_endpoint(
    Extension(directory): Extension<InMemoryIdentityDirectory>,
    Path(anon_id): Path<String>,
    Json(identity): Json<CandidateIdentity>,
) -> Result<Response, AppError> {
    let replaced = directory
        .register(AnonId(anon_id.clone()), identity)?;
    info!(candidate = %anon_id, replaced, "candidate identity registered");

    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(json!({ "anon_id": anon_id, "replaced": replaced }))).into_response())
}
