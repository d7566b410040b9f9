use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use serde_json::json;

use crate::server::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Ready as long as the process serves requests; a degraded cache only slows
/// responses down, so it is reported but does not fail readiness.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let remote_available = state.cache.is_remote_available().await;
    let body = json!({
        "status": "ready",
        "cache": {
            "mode": state.cache.mode().to_string(),
            "remoteAvailable": remote_available,
        },
    });
    (StatusCode::OK, Json(body))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}
