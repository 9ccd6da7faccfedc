use anyhow::Result;

use fleetdesk_core::backend::Backend;
use fleetdesk_core::{BookingStatus, NewBooking, ResourceId, WindowArgs};

use crate::client::HttpBackend;
use crate::render::{Render, render_bookings};
use crate::utils::tui::create_spinner;

/// List bookings in one status.
pub async fn list(client: &HttpBackend, status: BookingStatus) -> Result<()> {
    let spinner = create_spinner(format!("Loading {} bookings", status));
    let result = client.list_bookings(status).await;
    spinner.finish_and_clear();

    let title = match status {
        BookingStatus::Pending => "Pending",
        BookingStatus::Approved => "Approved",
        BookingStatus::Rejected => "Rejected",
        BookingStatus::Cancelled => "Cancelled",
        BookingStatus::Completed => "Completed",
    };
    println!("{}", render_bookings(title, &result?));
    Ok(())
}

/// File a new booking request on someone's behalf.
pub async fn request(
    client: &HttpBackend,
    requester: String,
    window: WindowArgs,
    resource: Option<String>,
    purpose: Option<String>,
) -> Result<()> {
    let booking = client
        .create_booking(NewBooking {
            requester,
            window: window.parse()?,
            resource_id: resource.map(ResourceId::new),
            purpose,
        })
        .await?;

    println!("Requested {}", booking.render());
    Ok(())
}
