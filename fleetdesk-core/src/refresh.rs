//! Dashboard refetching.
//!
//! Every change notification triggers a full refetch of the four dashboard
//! sections. Refetches may overlap, so each one carries a token from a
//! monotonically increasing counter and its result is applied only while that
//! token is still the latest issued. A slow, older refetch can never overwrite
//! a newer one.
//!
//! When the change feed closes the watch loop resubscribes with a growing
//! delay and refetches on reconnect. [`FeedStatus`] says whether the
//! dashboard is currently live.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::{AssignmentMap, Backend};
use crate::booking::{Booking, BookingStatus};
use crate::constants::{RESUBSCRIBE_DELAY_MS, RESUBSCRIBE_MAX_DELAY_MS};
use crate::error::{ErrorKind, FleetResult};
use crate::feed::Table;
use crate::resource::Resource;

/// One independently fetched part of the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    /// Nothing fetched yet
    Loading,
    Ready(T),
    /// The latest fetch failed; `last_known` is what the section showed before.
    Failed {
        error: String,
        kind: ErrorKind,
        last_known: Option<T>,
    },
}

impl<T: Clone> Section<T> {
    fn from_result(result: FleetResult<T>, previous: &Section<T>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e) => Section::Failed {
                error: e.to_string(),
                kind: e.kind(),
                last_known: previous.value().cloned(),
            },
        }
    }
}

impl<T> Section<T> {
    /// Fresh value, or the last known one if the latest fetch failed.
    pub fn value(&self) -> Option<&T> {
        match self {
            Section::Loading => None,
            Section::Ready(value) => Some(value),
            Section::Failed { last_known, .. } => last_known.as_ref(),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Section::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Section::Failed { .. })
    }
}

/// Results of one refetch, before they are applied.
#[derive(Debug)]
pub struct Fetched {
    pub pending: FleetResult<Vec<Booking>>,
    pub approved: FleetResult<Vec<Booking>>,
    pub resources: FleetResult<Vec<Resource>>,
    pub assignments: FleetResult<AssignmentMap>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Token of the refetch that produced this snapshot; 0 before the first one.
    pub token: u64,
    pub pending: Section<Vec<Booking>>,
    pub approved: Section<Vec<Booking>>,
    pub resources: Section<Vec<Resource>>,
    pub assignments: Section<AssignmentMap>,
    pub applied_at: Option<DateTime<Utc>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            token: 0,
            pending: Section::Loading,
            approved: Section::Loading,
            resources: Section::Loading,
            assignments: Section::Loading,
            applied_at: None,
        }
    }
}

impl Snapshot {
    fn next(&self, token: u64, fetched: Fetched) -> Snapshot {
        Snapshot {
            token,
            pending: Section::from_result(fetched.pending, &self.pending),
            approved: Section::from_result(fetched.approved, &self.approved),
            resources: Section::from_result(fetched.resources, &self.resources),
            assignments: Section::from_result(fetched.assignments, &self.assignments),
            applied_at: Some(Utc::now()),
        }
    }

    pub fn failed_sections(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if self.pending.is_failed() {
            failed.push("pending");
        }
        if self.approved.is_failed() {
            failed.push("approved");
        }
        if self.resources.is_failed() {
            failed.push("resources");
        }
        if self.assignments.is_failed() {
            failed.push("assignments");
        }
        failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { token: u64 },
    /// A newer refetch was issued; this result was dropped.
    Superseded { token: u64, latest: u64 },
}

/// Whether changes are reaching the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Live,
    /// The feed closed. Nothing refetches until the next attempt.
    Lost { attempt: u32, retry_in: Duration },
}

/// Delay before resubscribe attempt `attempt` (1-based), doubling up to a cap.
pub fn resubscribe_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(
        RESUBSCRIBE_DELAY_MS
            .saturating_mul(factor)
            .min(RESUBSCRIBE_MAX_DELAY_MS),
    )
}

pub struct Dashboard<B: Backend + ?Sized> {
    backend: Arc<B>,
    issued: AtomicU64,
    tx: watch::Sender<Arc<Snapshot>>,
    feed: watch::Sender<FeedStatus>,
}

impl<B: Backend + ?Sized + 'static> Dashboard<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::default()));
        let (feed, _) = watch::channel(FeedStatus::Connecting);
        Dashboard {
            backend,
            issued: AtomicU64::new(0),
            tx,
            feed,
        }
    }

    pub fn feed_status(&self) -> watch::Receiver<FeedStatus> {
        self.feed.subscribe()
    }

    /// Receiver that sees every applied snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    /// Issue the next token. Every token issued supersedes all earlier ones.
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch every section concurrently. A failing section does not stop the others.
    pub async fn fetch(&self) -> Fetched {
        let (pending, approved, resources, assignments) = tokio::join!(
            self.backend.list_bookings(BookingStatus::Pending),
            self.backend.list_bookings(BookingStatus::Approved),
            self.backend.list_resources(),
            self.backend.assignment_map(),
        );

        for (section, error) in [
            ("pending", pending.as_ref().err()),
            ("approved", approved.as_ref().err()),
            ("resources", resources.as_ref().err()),
            ("assignments", assignments.as_ref().err()),
        ] {
            if let Some(error) = error {
                tracing::warn!(section, %error, "dashboard section failed to load");
            }
        }

        Fetched {
            pending,
            approved,
            resources,
            assignments,
        }
    }

    /// Apply `fetched` if `token` is still the latest issued.
    pub fn apply(&self, token: u64, fetched: Fetched) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::Applied { token };

        // The check runs under the watch lock so two applies cannot interleave
        self.tx.send_if_modified(|current| {
            let latest = self.issued.load(Ordering::SeqCst);
            if token != latest || token <= current.token {
                outcome = RefreshOutcome::Superseded { token, latest };
                return false;
            }
            *current = Arc::new(current.next(token, fetched));
            true
        });

        match outcome {
            RefreshOutcome::Applied { token } => {
                tracing::debug!(token, "dashboard refreshed");
            }
            RefreshOutcome::Superseded { token, latest } => {
                tracing::debug!(token, latest, "stale refetch discarded");
            }
        }
        outcome
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let token = self.begin();
        let fetched = self.fetch().await;
        self.apply(token, fetched)
    }

    /// Subscribe to `tables`, refetch once, then refetch on every change.
    ///
    /// Each refetch runs in its own task. A closed feed is resubscribed after
    /// [`resubscribe_delay`], with a refetch on every reconnect since changes
    /// made in between were missed. Dropping the returned handle stops
    /// watching and releases the subscription.
    pub fn watch(self: &Arc<Self>, tables: &[Table]) -> WatchHandle {
        let dashboard = Arc::clone(self);
        let tables = tables.to_vec();
        let task = tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                match dashboard.backend.subscribe(&tables) {
                    Ok(mut subscription) => {
                        dashboard.feed.send_replace(FeedStatus::Live);
                        spawn_refresh(&dashboard);
                        while let Some(change) = subscription.next().await {
                            tracing::debug!(table = %change.table, "change received, refetching");
                            attempt = 0;
                            spawn_refresh(&dashboard);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "could not subscribe to change feed");
                    }
                }

                attempt = attempt.saturating_add(1);
                let retry_in = resubscribe_delay(attempt);
                tracing::warn!(
                    attempt,
                    retry_ms = retry_in.as_millis() as u64,
                    "change feed lost, resubscribing"
                );
                dashboard
                    .feed
                    .send_replace(FeedStatus::Lost { attempt, retry_in });
                tokio::time::sleep(retry_in).await;
            }
        });
        WatchHandle { task }
    }
}

fn spawn_refresh<B: Backend + ?Sized + 'static>(dashboard: &Arc<Dashboard<B>>) {
    let dashboard = Arc::clone(dashboard);
    tokio::spawn(async move {
        dashboard.refresh().await;
    });
}

/// Keeps a [`Dashboard::watch`] loop alive. Aborts it on drop.
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
