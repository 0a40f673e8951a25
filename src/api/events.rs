//! Server-sent session snapshots, one per state revision.

use crate::api::AppState;
use crate::error::AppError;
use crate::orchestration::TradeController;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::watch;

struct Cursor {
    rx: watch::Receiver<u64>,
    controller: Arc<TradeController>,
    first: bool,
}

/// The first event carries the current state; later ones follow changes.
/// Revisions that pile up between polls collapse into one event.
pub async fn session_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, AppError>>> {
    let cursor = Cursor {
        rx: state.controller.subscribe(),
        controller: state.controller.clone(),
        first: true,
    };

    let stream = stream::unfold(cursor, |mut cursor| async move {
        if !cursor.first && cursor.rx.changed().await.is_err() {
            return None;
        }
        cursor.first = false;
        if cursor.controller.is_shut_down() {
            return None;
        }

        let revision = *cursor.rx.borrow_and_update();
        let event = Event::default()
            .event("session")
            .id(revision.to_string())
            .json_data(cursor.controller.snapshot())
            .map_err(|e| AppError::Internal(e.to_string()));
        Some((event, cursor))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
