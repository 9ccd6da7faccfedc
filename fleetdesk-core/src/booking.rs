//! Bookings and their lifecycle.
//!
//! ```text
//! Pending ──approve──▶ Approved ──complete──▶ Completed
//!    │                    │
//!    ├──reject──▶ Rejected └──cancel──▶ Cancelled
//!    └──cancel──▶ Cancelled
//! ```
//!
//! Rejected, Cancelled and Completed are terminal. A resource may be assigned
//! while Pending and reassigned while Approved.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};
use crate::id::{BookingId, ResourceId};
use crate::time_window::BookingWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Assign,
    Approve,
    Reject,
    Cancel,
    Complete,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Approved,
        BookingStatus::Rejected,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
    ];

    /// Only approved bookings hold their resource against other bookings.
    pub fn holds_resource(self) -> bool {
        self == BookingStatus::Approved
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed
        )
    }

    pub fn allows(self, transition: Transition) -> bool {
        use BookingStatus::*;
        use Transition::*;

        matches!(
            (self, transition),
            (Pending, Assign | Approve | Reject | Cancel) | (Approved, Assign | Complete | Cancel)
        )
    }

    /// Status after `transition`, or `None` if the lifecycle forbids it.
    pub fn after(self, transition: Transition) -> Option<BookingStatus> {
        if !self.allows(transition) {
            return None;
        }
        Some(match transition {
            Transition::Assign => self,
            Transition::Approve => BookingStatus::Approved,
            Transition::Reject => BookingStatus::Rejected,
            Transition::Cancel => BookingStatus::Cancelled,
            Transition::Complete => BookingStatus::Completed,
        })
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BookingStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "approved" => Ok(BookingStatus::Approved),
            "rejected" => Ok(BookingStatus::Rejected),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(FleetError::MalformedRecord(format!(
                "unknown booking status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Assign => "assign",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Cancel => "cancel",
            Transition::Complete => "complete",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    /// Resource named on the request (gear bookings always name one)
    pub resource_id: Option<ResourceId>,
    pub requester: String,
    pub window: BookingWindow,
    pub status: BookingStatus,
    /// Resource an admin assigned (car bookings)
    pub assigned_resource_id: Option<ResourceId>,
    pub rejection_reason: Option<String>,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(request: NewBooking, now: DateTime<Utc>) -> FleetResult<Self> {
        request.window.validate()?;
        if request.requester.trim().is_empty() {
            return Err(FleetError::MalformedRecord("booking without requester".into()));
        }
        Ok(Booking {
            id: BookingId::new_random(),
            resource_id: request.resource_id,
            requester: request.requester,
            window: request.window,
            status: BookingStatus::Pending,
            assigned_resource_id: None,
            rejection_reason: None,
            purpose: request.purpose,
            created_at: now,
            updated_at: None,
        })
    }

    /// The resource this booking occupies: the assigned one, else the requested one.
    pub fn occupied_resource(&self) -> Option<&ResourceId> {
        self.assigned_resource_id
            .as_ref()
            .or(self.resource_id.as_ref())
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    pub fn ensure_allows(&self, transition: Transition) -> FleetResult<()> {
        if self.status.allows(transition) {
            Ok(())
        } else {
            Err(FleetError::InvalidTransition {
                status: self.status,
                transition,
            })
        }
    }

    /// Move through the lifecycle, stamping `updated_at`.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> FleetResult<()> {
        let next = self
            .status
            .after(transition)
            .ok_or(FleetError::InvalidTransition {
                status: self.status,
                transition,
            })?;
        self.status = next;
        self.updated_at = Some(now);
        Ok(())
    }

    /// Whether two bookings would compete for the same resource at the same time.
    pub fn competes_with(&self, other: &Booking) -> bool {
        self.id != other.id
            && self.occupied_resource().is_some()
            && self.occupied_resource() == other.occupied_resource()
            && self.window.overlaps(&other.window)
    }
}

impl fmt::Display for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.requester, self.window)
    }
}

/// Status change requested by an admin. Assignment has its own operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StatusChange {
    Approve,
    Reject { reason: String },
    Cancel,
    Complete,
}

impl StatusChange {
    pub fn transition(&self) -> Transition {
        match self {
            StatusChange::Approve => Transition::Approve,
            StatusChange::Reject { .. } => Transition::Reject,
            StatusChange::Cancel => Transition::Cancel,
            StatusChange::Complete => Transition::Complete,
        }
    }

    /// Reject with a reason that must not be blank.
    pub fn reject(reason: &str) -> FleetResult<Self> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FleetError::MissingReason);
        }
        Ok(StatusChange::Reject {
            reason: reason.to_string(),
        })
    }
}

/// Request body for creating a booking; always starts Pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub requester: String,
    pub window: BookingWindow,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Booking row as the backend reports it, every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Option<String>,
    pub resource_id: Option<String>,
    pub requester: Option<String>,
    pub window: Option<BookingWindow>,
    pub status: Option<String>,
    pub assigned_resource_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub purpose: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRecord> for Booking {
    type Error = FleetError;

    fn try_from(record: BookingRecord) -> FleetResult<Self> {
        let Some(id) = record.id.filter(|id| !id.is_empty()) else {
            return Err(FleetError::MalformedRecord("booking without id".into()));
        };
        let Some(requester) = record.requester else {
            return Err(FleetError::MalformedRecord(format!(
                "booking {} has no requester",
                id
            )));
        };
        let Some(window) = record.window else {
            return Err(FleetError::MalformedRecord(format!(
                "booking {} has no time window",
                id
            )));
        };
        let status = match record.status.as_deref() {
            Some(s) => s.parse()?,
            None => {
                return Err(FleetError::MalformedRecord(format!(
                    "booking {} has no status",
                    id
                )));
            }
        };
        let Some(created_at) = record.created_at.or(record.updated_at) else {
            return Err(FleetError::MalformedRecord(format!(
                "booking {} has no timestamps",
                id
            )));
        };

        Ok(Booking {
            id: BookingId::new(id),
            resource_id: record.resource_id.filter(|r| !r.is_empty()).map(ResourceId::new),
            requester,
            window,
            status,
            assigned_resource_id: record
                .assigned_resource_id
                .filter(|r| !r.is_empty())
                .map(ResourceId::new),
            rejection_reason: record.rejection_reason,
            purpose: record.purpose,
            created_at,
            updated_at: record.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_window::TimeWindow;
    use chrono::TimeZone;

    fn make_test_booking() -> Booking {
        Booking {
            id: BookingId::from("b-1"),
            resource_id: None,
            requester: "ana@example.com".to_string(),
            window: BookingWindow::Range(
                TimeWindow::new(
                    Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2025, 3, 20, 10, 0, 0).unwrap(),
                )
                .unwrap(),
            ),
            status: BookingStatus::Pending,
            assigned_resource_id: None,
            rejection_reason: None,
            purpose: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn test_lifecycle_edges() {
        use BookingStatus::*;
        use Transition::*;

        let allowed = [
            (Pending, Approve, Approved),
            (Pending, Reject, Rejected),
            (Pending, Cancel, Cancelled),
            (Pending, Assign, Pending),
            (Approved, Complete, Completed),
            (Approved, Cancel, Cancelled),
            (Approved, Assign, Approved),
        ];
        for (from, t, to) in allowed {
            assert_eq!(from.after(t), Some(to), "{} --{}--> {}", from, t, to);
        }

        assert_eq!(Pending.after(Complete), None);
        assert_eq!(Approved.after(Approve), None);
        assert_eq!(Approved.after(Reject), None);
    }

    #[test]
    fn test_terminal_states_allow_nothing() {
        let transitions = [
            Transition::Assign,
            Transition::Approve,
            Transition::Reject,
            Transition::Cancel,
            Transition::Complete,
        ];
        for status in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for t in transitions {
                assert!(!status.allows(t), "{} should not allow {}", status, t);
            }
        }
    }

    #[test]
    fn test_apply_stamps_updated_at() {
        let mut booking = make_test_booking();
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap();
        booking.apply(Transition::Approve, now).unwrap();
        assert_eq!(booking.status, BookingStatus::Approved);
        assert_eq!(booking.last_updated(), now);
    }

    #[test]
    fn test_apply_rejects_illegal_transition_without_change() {
        let mut booking = make_test_booking();
        booking.status = BookingStatus::Rejected;
        let err = booking.apply(Transition::Approve, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Cannot approve a booking that is rejected");
        assert_eq!(booking.status, BookingStatus::Rejected);
        assert_eq!(booking.updated_at, None);
    }

    #[test]
    fn test_occupied_resource_prefers_assignment() {
        let mut booking = make_test_booking();
        assert_eq!(booking.occupied_resource(), None);
        booking.resource_id = Some(ResourceId::from("gear-1"));
        assert_eq!(booking.occupied_resource(), Some(&ResourceId::from("gear-1")));
        booking.assigned_resource_id = Some(ResourceId::from("gear-2"));
        assert_eq!(booking.occupied_resource(), Some(&ResourceId::from("gear-2")));
    }

    #[test]
    fn test_record_conversion_requires_status() {
        let record = BookingRecord {
            id: Some("b-9".into()),
            requester: Some("lee".into()),
            window: Some(make_test_booking().window),
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        assert!(matches!(
            Booking::try_from(record.clone()),
            Err(FleetError::MalformedRecord(_))
        ));

        let record = BookingRecord {
            status: Some("Canceled".into()),
            assigned_resource_id: Some(String::new()),
            ..record
        };
        let booking = Booking::try_from(record).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.assigned_resource_id, None);
    }
}
