use crate::engine::SessionError;
use crate::orchestration::TradeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unavailable: {0}")]
    Unavailable(String),
    #[error("Bad gateway: {0}")]
    BadGateway(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InsufficientData { .. } | SessionError::OutOfOrder { .. } => {
                AppError::Unavailable(err.to_string())
            }
            SessionError::InvalidConfirmation(_) => AppError::BadGateway(err.to_string()),
            SessionError::PositionAlreadyOpen
            | SessionError::NoOpenPosition
            | SessionError::ClockNotRunning
            | SessionError::RequestInFlight
            | SessionError::PnlOutOfRange => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<TradeError> for AppError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::Session(e) => e.into(),
            TradeError::PersistenceCallFailed(e) => AppError::BadGateway(e.to_string()),
            TradeError::TaskFailed(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
