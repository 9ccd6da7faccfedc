//! Change notifications.
//!
//! A change carries no row data, only which table moved. Consumers refetch.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::constants::CHANGE_FEED_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Bookings,
    Resources,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Bookings, Table::Resources];
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Bookings => write!(f, "bookings"),
            Table::Resources => write!(f, "resources"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub table: Table,
    pub at: DateTime<Utc>,
}

/// Publishing side of the feed.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(CHANGE_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        ChangeFeed { tx }
    }

    pub fn publish(&self, table: Table) {
        // No subscribers is fine; nobody is watching.
        let _ = self.tx.send(Change {
            table,
            at: Utc::now(),
        });
    }

    pub fn subscribe(&self, tables: &[Table]) -> Subscription {
        Subscription::new(self.tx.subscribe(), tables)
    }

    /// Raw receiver, for building a [`Subscription`] around a reader task.
    pub fn receiver(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live subscription to some tables.
///
/// Dropping it unsubscribes, and stops the background reader feeding it if
/// there is one.
pub struct Subscription {
    rx: broadcast::Receiver<Change>,
    tables: Vec<Table>,
    reader: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<Change>, tables: &[Table]) -> Self {
        Subscription {
            rx,
            tables: tables.to_vec(),
            reader: None,
        }
    }

    /// Subscription fed by a task that owns the remote connection.
    pub fn with_reader(
        rx: broadcast::Receiver<Change>,
        tables: &[Table],
        reader: JoinHandle<()>,
    ) -> Self {
        Subscription {
            rx,
            tables: tables.to_vec(),
            reader: Some(reader),
        }
    }

    /// Next change on a subscribed table, or `None` once the feed closed.
    pub async fn next(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.tables.contains(&change.table) => return Some(change),
                Ok(_) => continue,
                // Missed notifications collapse into the ones still queued.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "change feed lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        tracing::debug!(tables = ?self.tables, "unsubscribed from change feed");
    }
}
