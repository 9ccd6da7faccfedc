//! HTTP service in front of the authoritative fleetdesk booking store.

pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::bookings::router())
        .merge(routes::resources::router())
        .merge(routes::history::router())
        .merge(routes::availability::router())
        .merge(routes::changes::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve [`app`] on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}
