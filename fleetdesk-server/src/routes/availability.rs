//! Availability check endpoint

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use fleetdesk_core::availability::{AvailabilityChecker, AvailabilityQuery, Verdict};
use fleetdesk_core::{BookingId, ResourceId, WindowArgs};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/availability", get(availability))
}

#[derive(Deserialize)]
pub struct AvailabilityParams {
    pub resource_id: String,
    pub exclude: Option<String>,
    #[serde(flatten)]
    pub window: WindowArgs,
}

/// GET /availability?resource_id=&exclude=&start=&end= (or &date=&slot=)
async fn availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Verdict>, AppError> {
    let query = AvailabilityQuery {
        resource_id: ResourceId::new(params.resource_id),
        window: params.window.parse()?,
        exclude: params.exclude.map(BookingId::new),
    };
    let verdict = AvailabilityChecker::new(state.backend())
        .check(&query)
        .await?;
    Ok(Json(verdict))
}
