use crate::api::AppState;
use crate::engine::SessionSnapshot;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

/// Start the replay. Already running or exhausted is a no-op.
pub async fn start(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    state.controller.start()?;
    Ok(Json(state.controller.snapshot()))
}

pub async fn stop(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.controller.stop();
    Json(state.controller.snapshot())
}

/// Rewind to the initial window; 409 while a position is open.
pub async fn reset(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    state.controller.reset_replay()?;
    Ok(Json(state.controller.snapshot()))
}
