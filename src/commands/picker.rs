//! Assignment picker: which resources could take a booking.

use anyhow::Result;
use owo_colors::OwoColorize;

use fleetdesk_core::BookingId;
use fleetdesk_core::availability::{AvailabilityChecker, ReadFailurePolicy};
use fleetdesk_core::backend::Backend;

use crate::client::HttpBackend;
use crate::render::Render;
use crate::utils::tui::create_spinner;

pub async fn run(client: &HttpBackend, booking: &str) -> Result<()> {
    let booking_id = BookingId::from(booking);
    let spinner = create_spinner("Checking availability".into());
    let (booking, resources) = tokio::join!(
        client.get_booking(&booking_id),
        client.list_resources()
    );
    let booking = booking?;
    let resources = resources?;

    // Display only: an unreadable schedule is flagged, not hidden
    let options = AvailabilityChecker::new(client)
        .annotate(&booking, &resources, ReadFailurePolicy::FailOpenFlagged)
        .await;
    spinner.finish_and_clear();

    println!("{}", booking.render());
    if options.is_empty() {
        println!("   {}", "No resources registered".dimmed());
    }
    for option in &options {
        println!("   {}", option.render());
    }
    Ok(())
}
