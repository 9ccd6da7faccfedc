//! Storage seam.
//!
//! Everything the booking rules need from the system of record goes through
//! [`Backend`]. fleetdesk-server serves a [`MemoryBackend`]; fleetdesk-cli
//! talks to that server through an HTTP implementation of the same trait.
//!
//! Implementations own the authoritative conflict check: `assign_resource`
//! and `change_status` must refuse a write that would double-book a resource,
//! whatever the caller checked beforehand.

mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::booking::{Booking, BookingStatus, NewBooking, StatusChange};
use crate::error::FleetResult;
use crate::feed::{Subscription, Table};
use crate::id::{BookingId, ResourceId};
use crate::resource::{NewResource, Resource, ResourceStatus};
use crate::time_window::BookingWindow;

pub use memory::MemoryBackend;

/// Approved bookings holding each resource, in window order.
pub type AssignmentMap = BTreeMap<ResourceId, Vec<BookingId>>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_bookings(&self, status: BookingStatus) -> FleetResult<Vec<Booking>>;

    async fn get_booking(&self, id: &BookingId) -> FleetResult<Booking>;

    async fn create_booking(&self, request: NewBooking) -> FleetResult<Booking>;

    async fn list_resources(&self) -> FleetResult<Vec<Resource>>;

    async fn get_resource(&self, id: &ResourceId) -> FleetResult<Resource>;

    async fn create_resource(&self, request: NewResource) -> FleetResult<Resource>;

    /// Admin status change (maintenance toggle, retirement).
    async fn set_resource_status(
        &self,
        id: &ResourceId,
        status: ResourceStatus,
    ) -> FleetResult<Resource>;

    /// Check-out (`true`) / check-in (`false`).
    async fn set_in_use(&self, id: &ResourceId, in_use: bool) -> FleetResult<Resource>;

    async fn assignment_map(&self) -> FleetResult<AssignmentMap>;

    /// First approved booking on `resource_id` overlapping `window`, ignoring `exclude`.
    async fn find_overlapping(
        &self,
        resource_id: &ResourceId,
        window: &BookingWindow,
        exclude: Option<&BookingId>,
    ) -> FleetResult<Option<Booking>>;

    async fn assign_resource(
        &self,
        booking_id: &BookingId,
        resource_id: &ResourceId,
    ) -> FleetResult<Booking>;

    async fn change_status(
        &self,
        booking_id: &BookingId,
        change: StatusChange,
    ) -> FleetResult<Booking>;

    fn subscribe(&self, tables: &[Table]) -> FleetResult<Subscription>;
}
