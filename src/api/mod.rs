pub mod events;
pub mod health;
pub mod positions;
pub mod session;
pub mod simulation;

use crate::error::AppError;
use crate::orchestration::TradeController;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<TradeController>,
}

impl AppState {
    pub fn new(controller: Arc<TradeController>) -> Self {
        Self { controller }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/session", get(session::get_session))
        .route("/v1/chart", get(session::get_chart))
        .route(
            "/v1/transactions",
            get(session::get_transactions).delete(session::reset_history),
        )
        .route("/v1/simulation/start", post(simulation::start))
        .route("/v1/simulation/stop", post(simulation::stop))
        .route("/v1/simulation/reset", post(simulation::reset))
        .route("/v1/positions/close", post(positions::close_position))
        .route("/v1/positions/:side", post(positions::open_position))
        .route("/v1/events", get(events::session_events))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("no such route".into())
}
