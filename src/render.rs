//! TUI rendering traits for fleetdesk types.
//!
//! Extension traits that add colored terminal rendering to fleetdesk-core
//! types using owo_colors.

use owo_colors::OwoColorize;

use fleetdesk_core::availability::{PickerOption, Verdict};
use fleetdesk_core::backend::AssignmentMap;
use fleetdesk_core::history::Page;
use fleetdesk_core::refresh::{FeedStatus, Section, Snapshot};
use fleetdesk_core::{Booking, BookingStatus, FleetError, Resource, ResourceStatus};

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for BookingStatus {
    fn render(&self) -> String {
        let text = self.to_string();
        match self {
            BookingStatus::Pending => text.yellow().to_string(),
            BookingStatus::Approved => text.green().to_string(),
            BookingStatus::Completed => text.blue().to_string(),
            BookingStatus::Rejected | BookingStatus::Cancelled => text.red().to_string(),
        }
    }
}

impl Render for ResourceStatus {
    fn render(&self) -> String {
        let text = self.to_string();
        match self {
            ResourceStatus::Available => text.green().to_string(),
            ResourceStatus::Maintenance => text.yellow().to_string(),
            ResourceStatus::Unavailable | ResourceStatus::Retired => text.red().to_string(),
        }
    }
}

impl Render for Booking {
    fn render(&self) -> String {
        let mut line = format!(
            "{} {} {} {}",
            self.id.dimmed(),
            self.requester.bold(),
            self.window,
            self.status.render()
        );
        if let Some(resource) = self.occupied_resource() {
            line.push_str(&format!(" → {}", resource));
        }
        if let Some(reason) = &self.rejection_reason {
            line.push_str(&format!(" ({})", reason).dimmed().to_string());
        }
        line
    }
}

impl Render for Resource {
    fn render(&self) -> String {
        let mut line = format!(
            "{} {} [{}] {}",
            self.id.dimmed(),
            self.label.bold(),
            self.kind,
            self.status.render()
        );
        match (self.quantity, self.available_quantity) {
            (Some(total), Some(available)) => {
                line.push_str(&format!(" {}/{} free", available, total));
            }
            _ if self.in_use => line.push_str(&format!(" {}", "checked out".yellow())),
            _ => {}
        }
        line
    }
}

impl Render for Verdict {
    fn render(&self) -> String {
        match self {
            Verdict::Clear => "available".green().to_string(),
            Verdict::Conflict { conflict } => conflict.to_string().red().to_string(),
            Verdict::Unverified { .. } => self.reason().unwrap_or_default().yellow().to_string(),
        }
    }
}

impl Render for PickerOption {
    fn render(&self) -> String {
        let mark = if !self.selectable() {
            "✗".red().to_string()
        } else if self.verdict.is_flagged() {
            "?".yellow().to_string()
        } else {
            "✓".green().to_string()
        };
        format!(
            "{} {} {} {}",
            mark,
            self.label.bold(),
            self.resource_id.dimmed(),
            self.verdict.render()
        )
    }
}

impl Render for FeedStatus {
    fn render(&self) -> String {
        match self {
            FeedStatus::Connecting => "connecting…".dimmed().to_string(),
            FeedStatus::Live => "live".green().to_string(),
            FeedStatus::Lost { attempt, retry_in } => format!(
                "change feed lost, showing last known data (retry {} in {:.1}s)",
                attempt,
                retry_in.as_secs_f32()
            )
            .red()
            .to_string(),
        }
    }
}

/// Render an error as a non-blocking warning when it is a conflict.
pub fn render_error(err: &FleetError) -> String {
    match err.as_conflict() {
        Some(conflict) => format!("{} {}", "Conflict:".yellow().bold(), conflict.yellow()),
        None => err.to_string().red().to_string(),
    }
}

pub fn render_bookings(title: &str, bookings: &[Booking]) -> String {
    let mut lines = vec![format!("{} ({})", title.bold(), bookings.len())];
    if bookings.is_empty() {
        lines.push(format!("   {}", "None".dimmed()));
    }
    lines.extend(bookings.iter().map(|b| format!("   {}", b.render())));
    lines.join("\n")
}

pub fn render_page(page: &Page<Booking>) -> String {
    let mut lines = Vec::new();
    if page.items.is_empty() {
        lines.push(format!("   {}", "No bookings on this page".dimmed()));
    }
    lines.extend(page.items.iter().map(|b| format!("   {}", b.render())));
    lines.push(
        format!(
            "   page {} of {} ({} total)",
            page.page,
            page.total_pages().max(1),
            page.total
        )
        .dimmed()
        .to_string(),
    );
    lines.join("\n")
}

fn render_section<T>(
    title: &str,
    section: &Section<T>,
    body: impl Fn(&T) -> Vec<String>,
) -> Vec<String> {
    let mut lines = vec![title.bold().to_string()];
    if let Some(error) = section.error() {
        lines.push(format!("   {} {}", "failed to load:".red(), error.red()));
        if section.value().is_some() {
            lines.push(format!("   {}", "showing last known".dimmed()));
        }
    }
    match section.value() {
        Some(value) => lines.extend(body(value).into_iter().map(|l| format!("   {}", l))),
        None if section.error().is_none() => lines.push(format!("   {}", "loading…".dimmed())),
        None => {}
    }
    lines
}

fn render_assignments(map: &AssignmentMap) -> Vec<String> {
    if map.is_empty() {
        return vec!["None".dimmed().to_string()];
    }
    map.iter()
        .map(|(resource, bookings)| {
            let ids: Vec<&str> = bookings.iter().map(|b| b.as_str()).collect();
            format!("{} ← {}", resource, ids.join(", "))
        })
        .collect()
}

impl Render for Snapshot {
    fn render(&self) -> String {
        let bookings = |list: &Vec<Booking>| -> Vec<String> {
            if list.is_empty() {
                vec!["None".dimmed().to_string()]
            } else {
                list.iter().map(Render::render).collect()
            }
        };

        let mut lines = Vec::new();
        lines.extend(render_section("Pending", &self.pending, bookings));
        lines.push(String::new());
        lines.extend(render_section("Approved", &self.approved, bookings));
        lines.push(String::new());
        lines.extend(render_section("Resources", &self.resources, |list| {
            list.iter().map(Render::render).collect()
        }));
        lines.push(String::new());
        lines.extend(render_section(
            "Assignments",
            &self.assignments,
            render_assignments,
        ));
        if let Some(at) = self.applied_at {
            lines.push(String::new());
            lines.push(
                format!("refreshed {}", at.format("%H:%M:%S"))
                    .dimmed()
                    .to_string(),
            );
        }
        lines.join("\n")
    }
}
