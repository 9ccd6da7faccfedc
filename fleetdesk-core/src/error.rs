//! Error types for the fleetdesk ecosystem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::{BookingStatus, Transition};
use crate::id::{BookingId, ResourceId};
use crate::resource::ResourceStatus;
use crate::time_window::BookingWindow;

/// Why a resource cannot take a booking right now.
///
/// Conflicts are an expected outcome (two admins racing for the same car,
/// a unit sent to maintenance between render and click), so they travel as
/// data and are rendered as warnings rather than failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    #[error("{label} is not available ({status})")]
    ResourceUnavailable {
        resource_id: ResourceId,
        label: String,
        status: ResourceStatus,
    },

    #[error("{label} is checked out, return pending")]
    CheckedOut { resource_id: ResourceId, label: String },

    #[error("{label} is already booked for {window} (booking {booking_id})")]
    ScheduleOverlap {
        resource_id: ResourceId,
        label: String,
        booking_id: BookingId,
        window: BookingWindow,
    },
}

impl Conflict {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Conflict::ResourceUnavailable { resource_id, .. }
            | Conflict::CheckedOut { resource_id, .. }
            | Conflict::ScheduleOverlap { resource_id, .. } => resource_id,
        }
    }
}

/// Errors that can occur in fleetdesk operations.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("Resource not found: {0}")]
    ResourceNotFound(ResourceId),

    #[error("Conflict: {0}")]
    Conflict(#[from] Conflict),

    #[error("Cannot {transition} a booking that is {status}")]
    InvalidTransition {
        status: BookingStatus,
        transition: Transition,
    },

    #[error("Booking {0} has no resource assigned")]
    NoResourceAssigned(BookingId),

    #[error("A reason is required to reject a booking")]
    MissingReason,

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server refused the request for a reason with no local variant.
    #[error("Server returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// How a failure should be surfaced to the person at the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Lost a race or hit an unavailable resource; warn and carry on.
    Conflict,
    /// The read or write did not reach the backend; the section can retry.
    Transient,
    /// Anything else; shown generically, never retried automatically.
    Unexpected,
}

impl FleetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FleetError::Conflict(_) => ErrorKind::Conflict,
            FleetError::Backend(_) | FleetError::Io(_) => ErrorKind::Transient,
            FleetError::Remote { status, .. } if *status >= 500 => ErrorKind::Transient,
            _ => ErrorKind::Unexpected,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn as_conflict(&self) -> Option<&Conflict> {
        match self {
            FleetError::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(e: serde_json::Error) -> Self {
        FleetError::Serialization(e.to_string())
    }
}

/// Result type alias for fleetdesk operations.
pub type FleetResult<T> = Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_are_classified_as_expected() {
        let err = FleetError::from(Conflict::CheckedOut {
            resource_id: ResourceId::from("car-1"),
            label: "Van 1".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "Conflict: Van 1 is checked out, return pending");
    }

    #[test]
    fn test_backend_failures_are_transient() {
        assert_eq!(
            FleetError::Backend("connection reset".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            FleetError::Unauthorized("expired session".into()).kind(),
            ErrorKind::Unexpected
        );
        assert_eq!(
            FleetError::Remote {
                status: 503,
                message: "store unavailable".into()
            }
            .kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            FleetError::Remote {
                status: 422,
                message: "Cannot approve a booking that is completed".into()
            }
            .kind(),
            ErrorKind::Unexpected
        );
    }

    #[test]
    fn test_conflict_serializes_with_kind_tag() {
        let conflict = Conflict::ResourceUnavailable {
            resource_id: ResourceId::from("car-2"),
            label: "Sedan".to_string(),
            status: ResourceStatus::Maintenance,
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["kind"], "resource_unavailable");
        assert_eq!(json["status"], "maintenance");
    }
}
