//! Time windows a booking can occupy.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};

/// Half-open `[start, end)` interval in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> FleetResult<Self> {
        let window = TimeWindow { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Parse CLI/query arguments. Accepts RFC3339 or `YYYY-MM-DDTHH:MM` (read as UTC).
    pub fn from_args(start: &str, end: &str) -> FleetResult<Self> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    pub fn validate(&self) -> FleetResult<()> {
        if self.end <= self.start {
            return Err(FleetError::InvalidWindow(format!(
                "end {} is not after start {}",
                self.end.to_rfc3339(),
                self.start.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// Two windows overlap iff `max(starts) < min(ends)`; touching windows do not.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }

    fn covering_day(date: NaiveDate) -> TimeWindow {
        let start = start_of_day(date);
        TimeWindow {
            start,
            end: start + chrono::Duration::days(1),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.date_naive() == self.end.date_naive() {
            write!(
                f,
                "{} {}–{}",
                self.start.format("%Y-%m-%d"),
                self.start.format("%H:%M"),
                self.end.format("%H:%M")
            )
        } else {
            write!(
                f,
                "{} – {}",
                self.start.format("%Y-%m-%d %H:%M"),
                self.end.format("%Y-%m-%d %H:%M")
            )
        }
    }
}

/// A named slot on a calendar day ("morning", "14:00-16:00", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub label: String,
}

impl Slot {
    pub fn new(date: NaiveDate, label: impl Into<String>) -> Self {
        Slot {
            date,
            label: label.into(),
        }
    }

    pub fn from_args(date: &str, label: &str) -> FleetResult<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            FleetError::InvalidWindow(format!("Invalid date '{}'. Expected YYYY-MM-DD", date))
        })?;
        if label.trim().is_empty() {
            return Err(FleetError::InvalidWindow("slot label is empty".into()));
        }
        Ok(Slot::new(date, label.trim()))
    }

    /// Slots only match when they name the same slot on the same day.
    pub fn same_slot(&self, other: &Slot) -> bool {
        self.date == other.date && self.label.trim() == other.label.trim()
    }
}

/// The period a booking occupies: an explicit range, or a named slot when
/// the booking form only offered slot labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingWindow {
    Range(TimeWindow),
    Slot(Slot),
}

impl BookingWindow {
    pub fn overlaps(&self, other: &BookingWindow) -> bool {
        match (self, other) {
            (BookingWindow::Range(a), BookingWindow::Range(b)) => a.overlaps(b),
            (BookingWindow::Slot(a), BookingWindow::Slot(b)) => a.same_slot(b),
            // Slot labels carry no hours, so a range is held against the whole day.
            (BookingWindow::Range(r), BookingWindow::Slot(s))
            | (BookingWindow::Slot(s), BookingWindow::Range(r)) => {
                r.overlaps(&TimeWindow::covering_day(s.date))
            }
        }
    }

    pub fn validate(&self) -> FleetResult<()> {
        match self {
            BookingWindow::Range(w) => w.validate(),
            BookingWindow::Slot(s) if s.label.trim().is_empty() => {
                Err(FleetError::InvalidWindow("slot label is empty".into()))
            }
            BookingWindow::Slot(_) => Ok(()),
        }
    }

    /// Instant used to order bookings chronologically.
    pub fn sort_key(&self) -> DateTime<Utc> {
        match self {
            BookingWindow::Range(w) => w.start,
            BookingWindow::Slot(s) => start_of_day(s.date),
        }
    }
}

impl From<TimeWindow> for BookingWindow {
    fn from(w: TimeWindow) -> Self {
        BookingWindow::Range(w)
    }
}

impl From<Slot> for BookingWindow {
    fn from(s: Slot) -> Self {
        BookingWindow::Slot(s)
    }
}

impl fmt::Display for BookingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingWindow::Range(w) => write!(f, "{}", w),
            BookingWindow::Slot(s) => write!(f, "{} ({})", s.date.format("%Y-%m-%d"), s.label),
        }
    }
}

/// A window as loose text parameters: `start`/`end`, or `date`/`slot`.
///
/// This is how windows travel in query strings and on the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl WindowArgs {
    pub fn parse(&self) -> FleetResult<BookingWindow> {
        match (&self.start, &self.end, &self.date, &self.slot) {
            (Some(start), Some(end), None, None) => Ok(TimeWindow::from_args(start, end)?.into()),
            (None, None, Some(date), Some(slot)) => Ok(Slot::from_args(date, slot)?.into()),
            _ => Err(FleetError::InvalidWindow(
                "give either start and end, or date and slot".into(),
            )),
        }
    }
}

impl From<&BookingWindow> for WindowArgs {
    fn from(window: &BookingWindow) -> Self {
        match window {
            BookingWindow::Range(w) => WindowArgs {
                start: Some(w.start.to_rfc3339()),
                end: Some(w.end.to_rfc3339()),
                ..WindowArgs::default()
            },
            BookingWindow::Slot(s) => WindowArgs {
                date: Some(s.date.format("%Y-%m-%d").to_string()),
                slot: Some(s.label.clone()),
                ..WindowArgs::default()
            },
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn parse_instant(s: &str) -> FleetResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .map(|dt| dt.and_utc())
        .map_err(|_| {
            FleetError::InvalidWindow(format!(
                "Invalid date/time '{}'. Expected RFC3339 or YYYY-MM-DDTHH:MM",
                s
            ))
        })
}
