use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

const SERVICE_NAME: &str = "reading-service";

/// Liveness probe backed by a MongoDB ping.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness probe: the store must answer and a model key must be present.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if !state.chat.is_configured() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
