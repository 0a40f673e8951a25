use crate::api::AppState;
use crate::engine::LoadState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Ready once a usable price series is loaded.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.controller.snapshot().load_state {
        LoadState::Ready => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready"})),
        ),
        other => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": other})),
        ),
    }
}
