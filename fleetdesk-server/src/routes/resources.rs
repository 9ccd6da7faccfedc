//! Resource and assignment endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde::Deserialize;

use fleetdesk_core::backend::{AssignmentMap, Backend};
use fleetdesk_core::{NewResource, Resource, ResourceId, ResourceStatus};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_resources).post(create_resource))
        .route("/resources/{id}", get(get_resource))
        .route("/resources/{id}/status", put(set_status))
        .route("/resources/{id}/in-use", put(set_in_use))
        .route("/assignments", get(assignments))
}

/// GET /resources
async fn list_resources(State(state): State<AppState>) -> Result<Json<Vec<Resource>>, AppError> {
    Ok(Json(state.backend().list_resources().await?))
}

/// POST /resources
async fn create_resource(
    State(state): State<AppState>,
    Json(req): Json<NewResource>,
) -> Result<Json<Resource>, AppError> {
    Ok(Json(state.backend().create_resource(req).await?))
}

/// GET /resources/:id
async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, AppError> {
    Ok(Json(state.backend().get_resource(&ResourceId::new(id)).await?))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: ResourceStatus,
}

/// PUT /resources/:id/status - Maintenance toggle, retirement
async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Resource>, AppError> {
    let resource = state
        .backend()
        .set_resource_status(&ResourceId::new(id), req.status)
        .await?;
    Ok(Json(resource))
}

#[derive(Deserialize)]
pub struct InUseRequest {
    pub in_use: bool,
}

/// PUT /resources/:id/in-use - Check-out (true) or check-in (false)
async fn set_in_use(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InUseRequest>,
) -> Result<Json<Resource>, AppError> {
    let resource = state
        .backend()
        .set_in_use(&ResourceId::new(id), req.in_use)
        .await?;
    Ok(Json(resource))
}

/// GET /assignments - Approved bookings per resource
async fn assignments(State(state): State<AppState>) -> Result<Json<AssignmentMap>, AppError> {
    Ok(Json(state.backend().assignment_map().await?))
}
