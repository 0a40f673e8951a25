use crate::api::AppState;
use crate::domain::{PricePoint, TransactionRecord};
use crate::engine::SessionSnapshot;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot())
}

/// The revealed prefix of the series, oldest first.
pub async fn get_chart(State(state): State<AppState>) -> Json<Vec<PricePoint>> {
    Json(state.controller.revealed_prefix())
}

/// Cached history in the order the persistence service returned it.
pub async fn get_transactions(State(state): State<AppState>) -> Json<Vec<TransactionRecord>> {
    Json(state.controller.history())
}

/// Clear the stored trades and reset the whole session.
pub async fn reset_history(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state.controller.reset_history().await?;
    Ok(Json(state.controller.snapshot()))
}
