//! Guarded booking actions.
//!
//! The guard re-checks availability through the client before asking the
//! server, and the server checks again under its lock.

use anyhow::Result;

use fleetdesk_core::BookingId;
use fleetdesk_core::ResourceId;
use fleetdesk_core::guard::AssignmentGuard;

use super::report;
use crate::client::HttpBackend;

pub async fn assign(client: &HttpBackend, booking: &str, resource: &str) -> Result<()> {
    let guard = AssignmentGuard::new(client);
    let result = guard
        .assign(&BookingId::from(booking), &ResourceId::from(resource))
        .await;
    report(result, "Assigned")
}

pub async fn approve(client: &HttpBackend, booking: &str) -> Result<()> {
    let result = AssignmentGuard::new(client)
        .approve(&BookingId::from(booking))
        .await;
    report(result, "Approved")
}

pub async fn reject(client: &HttpBackend, booking: &str, reason: &str) -> Result<()> {
    let result = AssignmentGuard::new(client)
        .reject(&BookingId::from(booking), reason)
        .await;
    report(result, "Rejected")
}

pub async fn cancel(client: &HttpBackend, booking: &str) -> Result<()> {
    let result = AssignmentGuard::new(client)
        .cancel(&BookingId::from(booking))
        .await;
    report(result, "Cancelled")
}

pub async fn complete(client: &HttpBackend, booking: &str) -> Result<()> {
    let result = AssignmentGuard::new(client)
        .complete(&BookingId::from(booking))
        .await;
    report(result, "Completed")
}
