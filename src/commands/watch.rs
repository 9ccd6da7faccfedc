//! Live dashboard.
//!
//! Redraws on every applied snapshot and every change-feed state change until
//! Ctrl-C. While the feed is lost the header says so and the dashboard
//! resubscribes on its own. The subscription and its SSE reader are released
//! when the watch handle drops on the way out.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use owo_colors::OwoColorize;

use fleetdesk_core::BookingId;
use fleetdesk_core::config::Preferences;
use fleetdesk_core::feed::Table;
use fleetdesk_core::refresh::{Dashboard, FeedStatus, Snapshot};

use crate::client::HttpBackend;
use crate::render::Render;
use crate::utils::tui::bell;

pub async fn run(client: HttpBackend, prefs: &Preferences) -> Result<()> {
    let client = Arc::new(client);
    let dashboard = Arc::new(Dashboard::new(Arc::clone(&client)));
    let mut snapshots = dashboard.subscribe();
    let mut feed = dashboard.feed_status();

    let _watch = dashboard.watch(&Table::ALL);

    let mut seen_pending: Option<BTreeSet<BookingId>> = None;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let pending = pending_ids(&snapshot);

                if let (Some(seen), Some(now)) = (&seen_pending, &pending) {
                    if prefs.sound && now.difference(seen).next().is_some() {
                        bell();
                    }
                }
                if pending.is_some() {
                    seen_pending = pending;
                }
            }
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        let snapshot = snapshots.borrow().clone();
        let status = feed.borrow_and_update().clone();
        redraw(&snapshot, &status);
    }

    Ok(())
}

fn redraw(snapshot: &Snapshot, status: &FeedStatus) {
    print!("\x1b[2J\x1b[H");
    println!(
        "{} {}\n",
        "fleetdesk (Ctrl-C to quit)".dimmed(),
        status.render()
    );
    println!("{}", snapshot.render());
}

fn pending_ids(snapshot: &Snapshot) -> Option<BTreeSet<BookingId>> {
    snapshot
        .pending
        .value()
        .map(|bookings| bookings.iter().map(|b| b.id.clone()).collect())
}
