//! Booking history: finished bookings, newest first, in fixed-size pages.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::booking::{Booking, BookingStatus};
use crate::error::{FleetError, FleetResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFilter {
    #[default]
    All,
    Completed,
    Rejected,
    Cancelled,
}

impl HistoryFilter {
    /// Statuses that must be fetched to answer this filter.
    pub fn statuses(self) -> &'static [BookingStatus] {
        match self {
            HistoryFilter::All => &[
                BookingStatus::Completed,
                BookingStatus::Rejected,
                BookingStatus::Cancelled,
            ],
            HistoryFilter::Completed => &[BookingStatus::Completed],
            HistoryFilter::Rejected => &[BookingStatus::Rejected],
            HistoryFilter::Cancelled => &[BookingStatus::Cancelled],
        }
    }
}

impl fmt::Display for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HistoryFilter::All => "all",
            HistoryFilter::Completed => "completed",
            HistoryFilter::Rejected => "rejected",
            HistoryFilter::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for HistoryFilter {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(HistoryFilter::All),
            "completed" => Ok(HistoryFilter::Completed),
            "rejected" => Ok(HistoryFilter::Rejected),
            "cancelled" | "canceled" => Ok(HistoryFilter::Cancelled),
            other => Err(FleetError::MalformedRecord(format!(
                "unknown history filter '{}' (expected all, completed, rejected or cancelled)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
    /// Items across all pages
    pub total: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.page_size.max(1))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Sort by last update, newest first, ties by id; drop repeated ids.
pub fn merge_history(bookings: impl IntoIterator<Item = Booking>) -> Vec<Booking> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Booking> = bookings
        .into_iter()
        .filter(|b| seen.insert(b.id.clone()))
        .collect();
    merged.sort_by(|a, b| {
        b.last_updated()
            .cmp(&a.last_updated())
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

/// Page `page` (1-based) holds items `[(page-1)*size, page*size)`.
///
/// Page 0 is read as page 1 and a zero size as 1. Pages past the end are
/// empty rather than an error.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size);

    Page {
        items: items.iter().skip(start).take(page_size).cloned().collect(),
        page,
        page_size,
        total: items.len(),
    }
}

/// Fetch the statuses `filter` covers concurrently, merge, and cut out one page.
pub async fn load_history<B: Backend + ?Sized>(
    backend: &B,
    filter: HistoryFilter,
    page: usize,
    page_size: usize,
) -> FleetResult<Page<Booking>> {
    let lists = try_join_all(
        filter
            .statuses()
            .iter()
            .map(|status| backend.list_bookings(*status)),
    )
    .await?;

    let merged = merge_history(lists.into_iter().flatten());
    tracing::debug!(%filter, total = merged.len(), page, "loaded history");
    Ok(paginate(&merged, page, page_size))
}
