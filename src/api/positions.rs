use crate::api::AppState;
use crate::domain::{Decimal, Position, Side};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub realized_pnl: Decimal,
    pub balance: Decimal,
}

fn parse_side(raw: &str) -> Result<Side, AppError> {
    match raw {
        "long" => Ok(Side::Long),
        "short" => Ok(Side::Short),
        other => Err(AppError::BadRequest(format!(
            "side must be long or short, got {}",
            other
        ))),
    }
}

pub async fn open_position(
    Path(side): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Position>, AppError> {
    let side = parse_side(&side)?;
    let position = state.controller.open(side).await?;
    Ok(Json(position))
}

pub async fn close_position(State(state): State<AppState>) -> Result<Json<CloseResponse>, AppError> {
    let realized_pnl = state.controller.close().await?;
    Ok(Json(CloseResponse {
        realized_pnl,
        balance: state.controller.snapshot().balance,
    }))
}
