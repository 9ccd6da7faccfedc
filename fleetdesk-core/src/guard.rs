//! Guarded assignment and approval.
//!
//! Each operation re-reads the booking and resource, re-checks availability,
//! and only then asks the backend to commit. The backend checks again under
//! its own lock, so a race lost between our check and the write still comes
//! back as a [`Conflict`](crate::error::Conflict), never as a double booking.

use crate::availability::{AvailabilityChecker, Verdict};
use crate::backend::Backend;
use crate::booking::{Booking, StatusChange, Transition};
use crate::error::{FleetError, FleetResult};
use crate::id::{BookingId, ResourceId};
use crate::resource::Resource;

pub struct AssignmentGuard<'a, B: Backend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> AssignmentGuard<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        AssignmentGuard { backend }
    }

    /// Assign (or reassign) `resource_id` to a pending or approved booking.
    pub async fn assign(
        &self,
        booking_id: &BookingId,
        resource_id: &ResourceId,
    ) -> FleetResult<Booking> {
        let booking = self.backend.get_booking(booking_id).await?;
        booking.ensure_allows(Transition::Assign)?;
        let resource = self.backend.get_resource(resource_id).await?;

        self.precheck(&booking, &resource).await?;

        let booking = self
            .backend
            .assign_resource(booking_id, resource_id)
            .await
            .inspect_err(|e| log_refusal(booking_id, Transition::Assign, e))?;
        tracing::info!(booking = %booking_id, resource = %resource_id, "assigned");
        Ok(booking)
    }

    /// Approve a pending booking that already has a resource.
    pub async fn approve(&self, booking_id: &BookingId) -> FleetResult<Booking> {
        let booking = self.backend.get_booking(booking_id).await?;
        booking.ensure_allows(Transition::Approve)?;
        let resource_id = booking
            .occupied_resource()
            .ok_or_else(|| FleetError::NoResourceAssigned(booking_id.clone()))?;
        let resource = self.backend.get_resource(resource_id).await?;

        self.precheck(&booking, &resource).await?;

        let booking = self
            .backend
            .change_status(booking_id, StatusChange::Approve)
            .await
            .inspect_err(|e| log_refusal(booking_id, Transition::Approve, e))?;
        tracing::info!(booking = %booking_id, "approved");
        Ok(booking)
    }

    pub async fn reject(&self, booking_id: &BookingId, reason: &str) -> FleetResult<Booking> {
        let change = StatusChange::reject(reason)?;
        self.change(booking_id, change).await
    }

    pub async fn cancel(&self, booking_id: &BookingId) -> FleetResult<Booking> {
        self.change(booking_id, StatusChange::Cancel).await
    }

    /// Check-in: the booking is over and the resource returned.
    pub async fn complete(&self, booking_id: &BookingId) -> FleetResult<Booking> {
        self.change(booking_id, StatusChange::Complete).await
    }

    async fn change(&self, booking_id: &BookingId, change: StatusChange) -> FleetResult<Booking> {
        let transition = change.transition();
        let booking = self.backend.get_booking(booking_id).await?;
        booking.ensure_allows(transition)?;

        let booking = self
            .backend
            .change_status(booking_id, change)
            .await
            .inspect_err(|e| log_refusal(booking_id, transition, e))?;
        tracing::info!(booking = %booking_id, status = %booking.status, "status changed");
        Ok(booking)
    }

    /// Fails closed: if availability cannot be read, nothing is committed.
    async fn precheck(&self, booking: &Booking, resource: &Resource) -> FleetResult<()> {
        let verdict = AvailabilityChecker::new(self.backend)
            .check_resource(resource, &booking.window, Some(&booking.id))
            .await
            .inspect_err(|e| {
                tracing::warn!(booking = %booking.id, resource = %resource.id, error = %e,
                    "availability unreadable, refusing to commit");
            })?;

        match verdict {
            Verdict::Conflict { conflict } => {
                tracing::info!(booking = %booking.id, %conflict, "conflict before commit");
                Err(conflict.into())
            }
            Verdict::Clear | Verdict::Unverified { .. } => Ok(()),
        }
    }
}

fn log_refusal(booking_id: &BookingId, transition: Transition, error: &FleetError) {
    if error.is_conflict() {
        tracing::info!(booking = %booking_id, %transition, %error, "backend refused: lost the race");
    } else {
        tracing::warn!(booking = %booking_id, %transition, %error, "backend refused");
    }
}
