//! Booking history endpoint

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use fleetdesk_core::Booking;
use fleetdesk_core::constants::DEFAULT_PAGE_SIZE;
use fleetdesk_core::history::{HistoryFilter, Page, load_history};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/history", get(history))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub status: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// GET /history?status=&page=&page_size=
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<Booking>>, AppError> {
    let filter = match query.status {
        Some(s) => s.parse::<HistoryFilter>()?,
        None => HistoryFilter::All,
    };
    let page = load_history(
        state.backend(),
        filter,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
    .await?;
    Ok(Json(page))
}
