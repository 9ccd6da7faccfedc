//! Fixtures shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::backend::{AssignmentMap, Backend, MemoryBackend};
use crate::booking::{Booking, BookingStatus, NewBooking, StatusChange};
use crate::error::{FleetError, FleetResult};
use crate::feed::{ChangeFeed, Subscription, Table};
use crate::id::{BookingId, ResourceId};
use crate::resource::{NewResource, Resource, ResourceStatus};
use crate::time_window::{BookingWindow, TimeWindow};

/// Window on 2025-03-20 from `h1:m1` to `h2:m2` UTC.
pub fn range(h1: u32, m1: u32, h2: u32, m2: u32) -> BookingWindow {
    BookingWindow::Range(
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 20, h1, m1, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 20, h2, m2, 0).unwrap(),
        )
        .unwrap(),
    )
}

pub fn booking(id: &str, window: BookingWindow) -> Booking {
    Booking {
        id: BookingId::from(id),
        resource_id: None,
        requester: "ana@example.com".to_string(),
        window,
        status: BookingStatus::Pending,
        assigned_resource_id: None,
        rejection_reason: None,
        purpose: None,
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        updated_at: None,
    }
}

/// Backend whose every call fails as if the network were down.
#[derive(Default)]
pub struct FailingBackend;

fn down<T>() -> FleetResult<T> {
    Err(FleetError::Backend("connection refused".into()))
}

#[async_trait]
impl Backend for FailingBackend {
    async fn list_bookings(&self, _: BookingStatus) -> FleetResult<Vec<Booking>> {
        down()
    }
    async fn get_booking(&self, _: &BookingId) -> FleetResult<Booking> {
        down()
    }
    async fn create_booking(&self, _: NewBooking) -> FleetResult<Booking> {
        down()
    }
    async fn list_resources(&self) -> FleetResult<Vec<Resource>> {
        down()
    }
    async fn get_resource(&self, _: &ResourceId) -> FleetResult<Resource> {
        down()
    }
    async fn create_resource(&self, _: NewResource) -> FleetResult<Resource> {
        down()
    }
    async fn set_resource_status(&self, _: &ResourceId, _: ResourceStatus) -> FleetResult<Resource> {
        down()
    }
    async fn set_in_use(&self, _: &ResourceId, _: bool) -> FleetResult<Resource> {
        down()
    }
    async fn assignment_map(&self) -> FleetResult<AssignmentMap> {
        down()
    }
    async fn find_overlapping(
        &self,
        _: &ResourceId,
        _: &BookingWindow,
        _: Option<&BookingId>,
    ) -> FleetResult<Option<Booking>> {
        down()
    }
    async fn assign_resource(&self, _: &BookingId, _: &ResourceId) -> FleetResult<Booking> {
        down()
    }
    async fn change_status(&self, _: &BookingId, _: StatusChange) -> FleetResult<Booking> {
        down()
    }
    fn subscribe(&self, _: &[Table]) -> FleetResult<Subscription> {
        down()
    }
}

/// How [`FlakyBackend`] answers `find_overlapping`.
#[derive(Clone, Copy, PartialEq)]
pub enum OverlapReads {
    Honest,
    Fail,
    /// Always reports a clear schedule, as a stale replica would.
    Blind,
}

/// A [`MemoryBackend`] whose overlap reads or change feed misbehave;
/// everything else passes through.
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    overlap_reads: OverlapReads,
    /// Subscriptions still to hand out already closed
    closing_feeds: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

impl FlakyBackend {
    fn with(overlap_reads: OverlapReads, closing_feeds: usize) -> Self {
        FlakyBackend {
            inner: MemoryBackend::new(),
            overlap_reads,
            closing_feeds: AtomicUsize::new(closing_feeds),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_overlap_reads() -> Self {
        Self::with(OverlapReads::Fail, 0)
    }

    pub fn blind_overlap_reads() -> Self {
        Self::with(OverlapReads::Blind, 0)
    }

    /// The first `count` subscriptions close at once, as when the server goes away.
    pub fn closing_feeds(count: usize) -> Self {
        Self::with(OverlapReads::Honest, count)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    async fn list_bookings(&self, status: BookingStatus) -> FleetResult<Vec<Booking>> {
        self.inner.list_bookings(status).await
    }
    async fn get_booking(&self, id: &BookingId) -> FleetResult<Booking> {
        self.inner.get_booking(id).await
    }
    async fn create_booking(&self, request: NewBooking) -> FleetResult<Booking> {
        self.inner.create_booking(request).await
    }
    async fn list_resources(&self) -> FleetResult<Vec<Resource>> {
        self.inner.list_resources().await
    }
    async fn get_resource(&self, id: &ResourceId) -> FleetResult<Resource> {
        self.inner.get_resource(id).await
    }
    async fn create_resource(&self, request: NewResource) -> FleetResult<Resource> {
        self.inner.create_resource(request).await
    }
    async fn set_resource_status(
        &self,
        id: &ResourceId,
        status: ResourceStatus,
    ) -> FleetResult<Resource> {
        self.inner.set_resource_status(id, status).await
    }
    async fn set_in_use(&self, id: &ResourceId, in_use: bool) -> FleetResult<Resource> {
        self.inner.set_in_use(id, in_use).await
    }
    async fn assignment_map(&self) -> FleetResult<AssignmentMap> {
        self.inner.assignment_map().await
    }
    async fn find_overlapping(
        &self,
        resource_id: &ResourceId,
        window: &BookingWindow,
        exclude: Option<&BookingId>,
    ) -> FleetResult<Option<Booking>> {
        match self.overlap_reads {
            OverlapReads::Honest => self.inner.find_overlapping(resource_id, window, exclude).await,
            OverlapReads::Fail => down(),
            OverlapReads::Blind => Ok(None),
        }
    }
    async fn assign_resource(
        &self,
        booking_id: &BookingId,
        resource_id: &ResourceId,
    ) -> FleetResult<Booking> {
        self.inner.assign_resource(booking_id, resource_id).await
    }
    async fn change_status(
        &self,
        booking_id: &BookingId,
        change: StatusChange,
    ) -> FleetResult<Booking> {
        self.inner.change_status(booking_id, change).await
    }
    fn subscribe(&self, tables: &[Table]) -> FleetResult<Subscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let closing = self
            .closing_feeds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if closing {
            // The feed drops on return, closing the receiver
            let feed = ChangeFeed::default();
            return Ok(Subscription::new(feed.receiver(), tables));
        }
        self.inner.subscribe(tables)
    }
}
