//! Booking endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use fleetdesk_core::backend::Backend;
use fleetdesk_core::{Booking, BookingId, BookingStatus, NewBooking, ResourceId};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/assign", post(assign))
        .route("/bookings/{id}/approve", post(approve))
        .route("/bookings/{id}/reject", post(reject))
        .route("/bookings/{id}/cancel", post(cancel))
        .route("/bookings/{id}/complete", post(complete))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// GET /bookings?status= - List bookings in one status (default pending)
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = match query.status {
        Some(s) => s.parse::<BookingStatus>()?,
        None => BookingStatus::Pending,
    };
    Ok(Json(state.backend().list_bookings(status).await?))
}

/// POST /bookings - Create a pending booking request
async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<NewBooking>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.backend().create_booking(req).await?))
}

/// GET /bookings/:id
async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.backend().get_booking(&BookingId::new(id)).await?))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub resource_id: ResourceId,
}

/// POST /bookings/:id/assign - Guarded assignment or reassignment
async fn assign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .guard()
        .assign(&BookingId::new(id), &req.resource_id)
        .await?;
    Ok(Json(booking))
}

/// POST /bookings/:id/approve - Guarded approval
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.guard().approve(&BookingId::new(id)).await?))
}

#[derive(Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// POST /bookings/:id/reject
async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .guard()
        .reject(&BookingId::new(id), &req.reason)
        .await?;
    Ok(Json(booking))
}

/// POST /bookings/:id/cancel
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.guard().cancel(&BookingId::new(id)).await?))
}

/// POST /bookings/:id/complete - Check-in
async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.guard().complete(&BookingId::new(id)).await?))
}
