//! Server-sent change feed

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};

use fleetdesk_core::feed::Table;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/changes", get(changes))
}

/// GET /changes - One `change` event per committed mutation
async fn changes(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.backend().feed().subscribe(&Table::ALL);
    tracing::debug!("change feed client connected");

    // The subscription lives inside the stream and is released when the client goes away
    let events = stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.next().await?;
        let event = Event::default().event("change").json_data(&change);
        Some((event, subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
