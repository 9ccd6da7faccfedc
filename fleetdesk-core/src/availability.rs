//! Availability checks for a resource over a booking window.
//!
//! The backend is the source of truth. These checks mirror its rule so the
//! picker can grey out resources and the guard can refuse early, but a clear
//! verdict here never guarantees the write will go through.

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::booking::Booking;
use crate::error::{Conflict, FleetResult};
use crate::id::{BookingId, ResourceId};
use crate::resource::Resource;
use crate::time_window::BookingWindow;

/// What to conclude when the availability read itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Treat the resource as unavailable. Used for anything that commits.
    FailClosed,
    /// Keep the resource selectable but flag it. Used for display only.
    FailOpenFlagged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Clear,
    Conflict { conflict: Conflict },
    Unverified {
        error: String,
        policy: ReadFailurePolicy,
    },
}

impl Verdict {
    pub fn is_conflict(&self) -> bool {
        match self {
            Verdict::Clear => false,
            Verdict::Conflict { .. } => true,
            Verdict::Unverified { policy, .. } => *policy == ReadFailurePolicy::FailClosed,
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Verdict::Unverified { .. })
    }

    /// Human-readable reason, if there is anything to say.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Clear => None,
            Verdict::Conflict { conflict } => Some(conflict.to_string()),
            Verdict::Unverified { error, .. } => {
                Some(format!("availability could not be verified: {}", error))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub resource_id: ResourceId,
    pub window: BookingWindow,
    /// Booking under edit, which must not conflict with itself
    pub exclude: Option<BookingId>,
}

/// One row of the assignment picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerOption {
    pub resource_id: ResourceId,
    pub label: String,
    pub verdict: Verdict,
}

impl PickerOption {
    pub fn selectable(&self) -> bool {
        !self.verdict.is_conflict()
    }
}

/// First approved booking on `resource_id` overlapping `window`, skipping `exclude`.
pub fn first_overlap<'a, I>(
    bookings: I,
    resource_id: &ResourceId,
    window: &BookingWindow,
    exclude: Option<&BookingId>,
) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings.into_iter().find(|b| {
        b.status.holds_resource()
            && b.occupied_resource() == Some(resource_id)
            && Some(&b.id) != exclude
            && b.window.overlaps(window)
    })
}

/// Full rule against an in-memory view: status gate first, then schedule.
pub fn find_conflict<'a, I>(
    resource: &Resource,
    window: &BookingWindow,
    exclude: Option<&BookingId>,
    bookings: I,
) -> Option<Conflict>
where
    I: IntoIterator<Item = &'a Booking>,
{
    if let Err(conflict) = resource.check_assignable() {
        return Some(conflict);
    }
    first_overlap(bookings, &resource.id, window, exclude).map(|b| overlap_conflict(resource, b))
}

fn overlap_conflict(resource: &Resource, holder: &Booking) -> Conflict {
    Conflict::ScheduleOverlap {
        resource_id: resource.id.clone(),
        label: resource.label.clone(),
        booking_id: holder.id.clone(),
        window: holder.window.clone(),
    }
}

pub struct AvailabilityChecker<'a, B: Backend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> AvailabilityChecker<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        AvailabilityChecker { backend }
    }

    /// Read-only check. Read failures are returned to the caller.
    pub async fn check(&self, query: &AvailabilityQuery) -> FleetResult<Verdict> {
        let resource = self.backend.get_resource(&query.resource_id).await?;
        self.check_resource(&resource, &query.window, query.exclude.as_ref())
            .await
    }

    /// Check an already-fetched resource. The status gate needs no read.
    pub async fn check_resource(
        &self,
        resource: &Resource,
        window: &BookingWindow,
        exclude: Option<&BookingId>,
    ) -> FleetResult<Verdict> {
        if let Err(conflict) = resource.check_assignable() {
            return Ok(Verdict::Conflict { conflict });
        }

        let holder = self
            .backend
            .find_overlapping(&resource.id, window, exclude)
            .await?;

        Ok(match holder {
            Some(b) => Verdict::Conflict {
                conflict: overlap_conflict(resource, &b),
            },
            None => Verdict::Clear,
        })
    }

    pub async fn check_with_policy(
        &self,
        query: &AvailabilityQuery,
        policy: ReadFailurePolicy,
    ) -> Verdict {
        match self.check(query).await {
            Ok(verdict) => verdict,
            Err(e) => unverified(&query.resource_id, e.to_string(), policy),
        }
    }

    /// Annotate every resource for the picker of `booking`.
    pub async fn annotate(
        &self,
        booking: &Booking,
        resources: &[Resource],
        policy: ReadFailurePolicy,
    ) -> Vec<PickerOption> {
        let checks = resources.iter().map(|resource| async move {
            let verdict = match self
                .check_resource(resource, &booking.window, Some(&booking.id))
                .await
            {
                Ok(verdict) => verdict,
                Err(e) => unverified(&resource.id, e.to_string(), policy),
            };
            PickerOption {
                resource_id: resource.id.clone(),
                label: resource.label.clone(),
                verdict,
            }
        });

        join_all(checks).await
    }
}

fn unverified(resource_id: &ResourceId, error: String, policy: ReadFailurePolicy) -> Verdict {
    tracing::warn!(resource = %resource_id, ?policy, %error, "availability read failed");
    Verdict::Unverified { error, policy }
}
