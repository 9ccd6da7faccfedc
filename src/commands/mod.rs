pub mod bookings;
pub mod check;
pub mod config;
pub mod history;
pub mod lifecycle;
pub mod picker;
pub mod resources;
pub mod watch;

use anyhow::Result;
use owo_colors::OwoColorize;

use fleetdesk_core::{Booking, FleetResult};

use crate::render::{Render, render_error};

/// Print the outcome of a booking action.
///
/// A conflict is an expected outcome: it is shown as a warning and the
/// command still succeeds. Anything else propagates.
pub fn report(result: FleetResult<Booking>, done: &str) -> Result<()> {
    match result {
        Ok(booking) => {
            println!("{} {}", done.green(), booking.render());
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            println!("{}", render_error(&e));
            println!("   {}", "Nothing was changed.".dimmed());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use fleetdesk_core::{BookingWindow, Conflict, FleetError, NewBooking, ResourceId, TimeWindow};

    fn make_booking() -> Booking {
        let window =
            TimeWindow::from_args("2025-03-20T09:00:00Z", "2025-03-20T10:00:00Z").unwrap();
        Booking::new(
            NewBooking {
                requester: "ana@example.com".into(),
                window: BookingWindow::Range(window),
                resource_id: None,
                purpose: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_report_success() {
        assert!(report(Ok(make_booking()), "Approved").is_ok());
    }

    #[test]
    fn test_report_treats_conflict_as_warning() {
        let conflict = FleetError::from(Conflict::CheckedOut {
            resource_id: ResourceId::from("car-1"),
            label: "Van 1".into(),
        });
        assert!(report(Err(conflict), "Assigned").is_ok());
    }

    #[test]
    fn test_report_propagates_other_errors() {
        let err = report(Err(FleetError::Backend("connection reset".into())), "Assigned")
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));

        assert!(report(Err(FleetError::MissingReason), "Rejected").is_err());
    }
}
