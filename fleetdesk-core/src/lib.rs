//! Core types and booking rules for the fleetdesk ecosystem.
//!
//! This crate is shared by fleetdesk-server and fleetdesk-cli:
//! - `booking`, `resource`, `time_window` for the data model
//! - `availability` and `guard` for conflict checks and guarded assignment/approval
//! - `history` for paginated booking history
//! - `feed` and `refresh` for change notifications and dashboard refetching
//! - `backend` for the storage seam and the in-memory reference backend
//! - `config` for user preferences (server URL, page size, data directory)

pub mod availability;
pub mod backend;
pub mod booking;
pub mod config;
pub mod constants;
pub mod error;
pub mod feed;
pub mod guard;
pub mod history;
pub mod id;
pub mod refresh;
pub mod resource;
pub mod time_window;

#[cfg(test)]
mod test_support;

pub use booking::{Booking, BookingStatus, NewBooking, StatusChange, Transition};
pub use error::{Conflict, ErrorKind, FleetError, FleetResult};
pub use id::{BookingId, ResourceId};
pub use resource::{NewResource, Resource, ResourceKind, ResourceStatus};
pub use time_window::{BookingWindow, Slot, TimeWindow, WindowArgs};
