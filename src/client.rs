//! HTTP client for communicating with fleetdesk-server
//!
//! [`HttpBackend`] implements the core `Backend` trait, so the guard,
//! availability checker and dashboard run here exactly as they do on the
//! server. Rows are read as loose records and converted explicitly.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use fleetdesk_core::availability::{Verdict, first_overlap};
use fleetdesk_core::backend::{AssignmentMap, Backend};
use fleetdesk_core::booking::BookingRecord;
use fleetdesk_core::config::Preferences;
use fleetdesk_core::feed::{Change, ChangeFeed, Subscription, Table};
use fleetdesk_core::history::{HistoryFilter, Page};
use fleetdesk_core::resource::ResourceRecord;
use fleetdesk_core::{
    Booking, BookingId, BookingStatus, BookingWindow, Conflict, FleetError, FleetResult,
    NewBooking, NewResource, Resource, ResourceId, ResourceStatus, StatusChange, Transition,
    WindowArgs,
};

const MAX_RETRIES: u32 = 10;
const RETRY_DELAY_MS: u64 = 200;

/// HTTP client for fleetdesk-server
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub conflict: Option<Conflict>,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub transition: Option<Transition>,
}

impl ErrorResponse {
    /// Rebuild the server's error; codes without enough detail stay `Remote`.
    fn into_error(self, http_status: u16) -> FleetError {
        if let Some(conflict) = self.conflict {
            return FleetError::Conflict(conflict);
        }
        match (
            self.code.as_deref(),
            self.booking_id,
            self.resource_id,
            self.status,
            self.transition,
        ) {
            (Some("booking_not_found"), Some(id), ..) => FleetError::BookingNotFound(id),
            (Some("resource_not_found"), _, Some(id), ..) => FleetError::ResourceNotFound(id),
            (Some("no_resource_assigned"), Some(id), ..) => FleetError::NoResourceAssigned(id),
            (Some("invalid_transition"), _, _, Some(status), Some(transition)) => {
                FleetError::InvalidTransition { status, transition }
            }
            (Some("missing_reason"), ..) => FleetError::MissingReason,
            (Some("unauthorized"), ..) => FleetError::Unauthorized(self.error),
            _ => FleetError::Remote {
                status: http_status,
                message: self.error,
            },
        }
    }
}

fn transport(e: reqwest::Error) -> FleetError {
    FleetError::Backend(e.to_string())
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpBackend {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Connect to the configured server, starting a local one if nothing answers
    pub async fn connect(prefs: &Preferences) -> Result<Self> {
        let client = Self::new(&prefs.server_url);

        if client.health_check().await.is_ok() {
            return Ok(client);
        }

        // Server not running - start it
        start_server()?;

        for _ in 0..MAX_RETRIES {
            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            if client.health_check().await.is_ok() {
                return Ok(client);
            }
        }

        anyhow::bail!(
            "Failed to connect to fleetdesk-server at {} after starting it",
            client.base_url
        )
    }

    async fn health_check(&self) -> Result<()> {
        self.http
            .get(self.url("/health"))
            .timeout(Duration::from_secs(2))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> FleetResult<T> {
        let resp = request.send().await.map_err(transport)?;
        decode(resp).await
    }

    async fn booking(&self, request: RequestBuilder) -> FleetResult<Booking> {
        let record: BookingRecord = self.send(request).await?;
        Booking::try_from(record)
    }

    async fn resource(&self, request: RequestBuilder) -> FleetResult<Resource> {
        let record: ResourceRecord = self.send(request).await?;
        Resource::try_from(record)
    }

    /// GET /history
    pub async fn history(
        &self,
        filter: HistoryFilter,
        page: usize,
        page_size: usize,
    ) -> FleetResult<Page<Booking>> {
        let page: Page<BookingRecord> = self
            .send(self.http.get(self.url("/history")).query(&[
                ("status", filter.to_string()),
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
            ]))
            .await?;

        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(Booking::try_from)
                .collect::<FleetResult<_>>()?,
            page: page.page,
            page_size: page.page_size,
            total: page.total,
        })
    }

    /// GET /availability, answered by the server from its own state
    pub async fn availability(
        &self,
        resource_id: &ResourceId,
        window: &BookingWindow,
        exclude: Option<&BookingId>,
    ) -> FleetResult<Verdict> {
        let mut request = self
            .http
            .get(self.url("/availability"))
            .query(&[("resource_id", resource_id.as_str())])
            .query(&WindowArgs::from(window));
        if let Some(exclude) = exclude {
            request = request.query(&[("exclude", exclude.as_str())]);
        }
        self.send(request).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> FleetResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let err = match resp.json::<ErrorResponse>().await {
            Ok(body) => body.into_error(status.as_u16()),
            Err(_) => FleetError::Remote {
                status: status.as_u16(),
                message: status.to_string(),
            },
        };
        return Err(err);
    }

    resp.json().await.map_err(|e| {
        if e.is_decode() {
            FleetError::Serialization(e.to_string())
        } else {
            transport(e)
        }
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_bookings(&self, status: BookingStatus) -> FleetResult<Vec<Booking>> {
        let records: Vec<BookingRecord> = self
            .send(
                self.http
                    .get(self.url("/bookings"))
                    .query(&[("status", status.to_string())]),
            )
            .await?;
        records.into_iter().map(Booking::try_from).collect()
    }

    async fn get_booking(&self, id: &BookingId) -> FleetResult<Booking> {
        self.booking(self.http.get(self.url(&format!("/bookings/{}", id))))
            .await
    }

    async fn create_booking(&self, request: NewBooking) -> FleetResult<Booking> {
        self.booking(self.http.post(self.url("/bookings")).json(&request))
            .await
    }

    async fn list_resources(&self) -> FleetResult<Vec<Resource>> {
        let records: Vec<ResourceRecord> = self.send(self.http.get(self.url("/resources"))).await?;
        records.into_iter().map(Resource::try_from).collect()
    }

    async fn get_resource(&self, id: &ResourceId) -> FleetResult<Resource> {
        self.resource(self.http.get(self.url(&format!("/resources/{}", id))))
            .await
    }

    async fn create_resource(&self, request: NewResource) -> FleetResult<Resource> {
        self.resource(self.http.post(self.url("/resources")).json(&request))
            .await
    }

    async fn set_resource_status(
        &self,
        id: &ResourceId,
        status: ResourceStatus,
    ) -> FleetResult<Resource> {
        self.resource(
            self.http
                .put(self.url(&format!("/resources/{}/status", id)))
                .json(&json!({ "status": status })),
        )
        .await
    }

    async fn set_in_use(&self, id: &ResourceId, in_use: bool) -> FleetResult<Resource> {
        self.resource(
            self.http
                .put(self.url(&format!("/resources/{}/in-use", id)))
                .json(&json!({ "in_use": in_use })),
        )
        .await
    }

    async fn assignment_map(&self) -> FleetResult<AssignmentMap> {
        self.send(self.http.get(self.url("/assignments"))).await
    }

    /// Client-side mirror of the server rule over the approved list.
    async fn find_overlapping(
        &self,
        resource_id: &ResourceId,
        window: &BookingWindow,
        exclude: Option<&BookingId>,
    ) -> FleetResult<Option<Booking>> {
        let approved = self.list_bookings(BookingStatus::Approved).await?;
        Ok(first_overlap(&approved, resource_id, window, exclude).cloned())
    }

    async fn assign_resource(
        &self,
        booking_id: &BookingId,
        resource_id: &ResourceId,
    ) -> FleetResult<Booking> {
        self.booking(
            self.http
                .post(self.url(&format!("/bookings/{}/assign", booking_id)))
                .json(&json!({ "resource_id": resource_id })),
        )
        .await
    }

    async fn change_status(
        &self,
        booking_id: &BookingId,
        change: StatusChange,
    ) -> FleetResult<Booking> {
        let (action, body) = match change {
            StatusChange::Approve => ("approve", None),
            StatusChange::Reject { reason } => ("reject", Some(json!({ "reason": reason }))),
            StatusChange::Cancel => ("cancel", None),
            StatusChange::Complete => ("complete", None),
        };
        let mut request = self
            .http
            .post(self.url(&format!("/bookings/{}/{}", booking_id, action)));
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.booking(request).await
    }

    /// Opens GET /changes in a background task that feeds the subscription.
    fn subscribe(&self, tables: &[Table]) -> FleetResult<Subscription> {
        let feed = ChangeFeed::default();
        let rx = feed.receiver();
        let request = self.http.get(self.url("/changes"));

        let reader = tokio::spawn(async move {
            if let Err(e) = read_changes(request, &feed).await {
                tracing::warn!(error = %e, "change feed disconnected");
            }
            // Dropping `feed` closes the subscription
        });

        Ok(Subscription::with_reader(rx, tables, reader))
    }
}

async fn read_changes(request: RequestBuilder, feed: &ChangeFeed) -> FleetResult<()> {
    let resp = request.send().await.map_err(transport)?;
    if !resp.status().is_success() {
        return Err(FleetError::Remote {
            status: resp.status().as_u16(),
            message: "change feed refused".into(),
        });
    }
    tracing::debug!("change feed connected");

    let mut parser = SseParser::default();
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(transport)?;
        for change in parser.push(&chunk) {
            feed.publish(change.table);
        }
    }
    Ok(())
}

/// Incremental parser for the `text/event-stream` body of GET /changes.
#[derive(Default)]
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    /// Feed a chunk, returning every complete `change` event it finished.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Change> {
        self.buf.extend(chunk.iter().filter(|b| **b != b'\r'));

        let mut changes = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(change) = parse_event(&String::from_utf8_lossy(&block)) {
                changes.push(change);
            }
        }
        changes
    }
}

fn parse_event(block: &str) -> Option<Change> {
    let mut event = None;
    let mut data = Vec::new();
    for line in block.lines() {
        // Lines starting with ':' are keep-alive comments
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.trim_start());
        }
    }

    if data.is_empty() || event.is_some_and(|e| e != "change") {
        return None;
    }
    match serde_json::from_str(&data.join("\n")) {
        Ok(change) => Some(change),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable change event");
            None
        }
    }
}

fn start_server() -> Result<()> {
    Command::new("fleetdesk-server")
        .spawn()
        .context("Failed to start fleetdesk-server. Is it installed?")?;
    Ok(())
}
