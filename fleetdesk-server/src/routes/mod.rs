pub mod availability;
pub mod bookings;
pub mod changes;
pub mod history;
pub mod resources;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use fleetdesk_core::{BookingId, BookingStatus, Conflict, FleetError, ResourceId, Transition};

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    /// Present on 409 so clients can render the reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
    #[serde(flatten)]
    pub detail: ErrorDetail,
}

/// Fields a client needs to rebuild the error on its side
#[derive(Default, Serialize)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
}

impl From<&FleetError> for ErrorDetail {
    fn from(err: &FleetError) -> Self {
        match err {
            FleetError::BookingNotFound(id) | FleetError::NoResourceAssigned(id) => ErrorDetail {
                booking_id: Some(id.clone()),
                ..Default::default()
            },
            FleetError::ResourceNotFound(id) => ErrorDetail {
                resource_id: Some(id.clone()),
                ..Default::default()
            },
            FleetError::InvalidTransition { status, transition } => ErrorDetail {
                status: Some(*status),
                transition: Some(*transition),
                ..Default::default()
            },
            _ => ErrorDetail::default(),
        }
    }
}

/// Convert anyhow errors to HTTP responses
pub struct AppError(anyhow::Error);

fn classify(err: &FleetError) -> (StatusCode, &'static str) {
    match err {
        FleetError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "booking_not_found"),
        FleetError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, "resource_not_found"),
        FleetError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        FleetError::InvalidTransition { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
        }
        FleetError::NoResourceAssigned(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "no_resource_assigned")
        }
        FleetError::MissingReason => (StatusCode::BAD_REQUEST, "missing_reason"),
        FleetError::InvalidWindow(_) | FleetError::MalformedRecord(_) => {
            (StatusCode::BAD_REQUEST, "invalid_input")
        }
        FleetError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let fleet_error = self.0.downcast_ref::<FleetError>();
        let (status, code) = fleet_error
            .map(classify)
            .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "internal"));

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code,
            conflict: fleet_error.and_then(FleetError::as_conflict).cloned(),
            detail: fleet_error.map(ErrorDetail::from).unwrap_or_default(),
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
