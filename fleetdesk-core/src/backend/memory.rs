//! In-memory system of record with optional JSON persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{AssignmentMap, Backend};
use crate::availability::{find_conflict, first_overlap};
use crate::booking::{Booking, BookingStatus, NewBooking, StatusChange, Transition};
use crate::error::{FleetError, FleetResult};
use crate::feed::{ChangeFeed, Subscription, Table};
use crate::id::{BookingId, ResourceId};
use crate::resource::{NewResource, Resource, ResourceStatus};
use crate::time_window::BookingWindow;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Store {
    #[serde(default)]
    bookings: BTreeMap<BookingId, Booking>,
    #[serde(default)]
    resources: BTreeMap<ResourceId, Resource>,
}

impl Store {
    fn booking(&self, id: &BookingId) -> FleetResult<&Booking> {
        self.bookings
            .get(id)
            .ok_or_else(|| FleetError::BookingNotFound(id.clone()))
    }

    fn resource(&self, id: &ResourceId) -> FleetResult<&Resource> {
        self.resources
            .get(id)
            .ok_or_else(|| FleetError::ResourceNotFound(id.clone()))
    }

    fn load(path: &Path) -> FleetResult<Self> {
        if !path.exists() {
            return Ok(Store::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, path: &Path) -> FleetResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Authoritative backend.
///
/// One lock covers every read-check-write, so two admins assigning the same
/// resource are serialised and the second sees the first's booking.
pub struct MemoryBackend {
    store: Mutex<Store>,
    feed: ChangeFeed,
    path: Option<PathBuf>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            store: Mutex::new(Store::default()),
            feed: ChangeFeed::default(),
            path: None,
        }
    }

    /// Load from `path` if it exists, and write every mutation back to it.
    pub fn open(path: impl Into<PathBuf>) -> FleetResult<Self> {
        let path = path.into();
        let store = Store::load(&path)?;
        tracing::info!(
            path = %path.display(),
            bookings = store.bookings.len(),
            resources = store.resources.len(),
            "opened booking store"
        );
        Ok(MemoryBackend {
            store: Mutex::new(store),
            feed: ChangeFeed::default(),
            path: Some(path),
        })
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Import an existing row as-is (seeding, migration).
    pub async fn insert_booking(&self, booking: Booking) -> FleetResult<()> {
        let mut store = self.store.lock().await;
        let mut staged = store.clone();
        staged.bookings.insert(booking.id.clone(), booking);
        self.commit(&mut store, staged, Table::Bookings)
    }

    /// Persist `staged`, then make it live.
    ///
    /// Mutations are made on a copy of the store. When the write fails the
    /// live store is left as it was and nothing is published.
    fn commit(&self, store: &mut Store, staged: Store, table: Table) -> FleetResult<()> {
        if let Some(path) = &self.path {
            staged.save(path)?;
        }
        *store = staged;
        self.feed.publish(table);
        Ok(())
    }

    fn update_resource(
        &self,
        store: &mut Store,
        id: &ResourceId,
        update: impl FnOnce(&mut Resource),
    ) -> FleetResult<Resource> {
        let mut staged = store.clone();
        let resource = staged
            .resources
            .get_mut(id)
            .ok_or_else(|| FleetError::ResourceNotFound(id.clone()))?;
        update(resource);
        let updated = resource.clone();
        self.commit(store, staged, Table::Resources)?;
        Ok(updated)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_bookings(&self, status: BookingStatus) -> FleetResult<Vec<Booking>> {
        let store = self.store.lock().await;
        let mut bookings: Vec<Booking> = store
            .bookings
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            a.window
                .sort_key()
                .cmp(&b.window.sort_key())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(bookings)
    }

    async fn get_booking(&self, id: &BookingId) -> FleetResult<Booking> {
        let store = self.store.lock().await;
        store.booking(id).cloned()
    }

    async fn create_booking(&self, request: NewBooking) -> FleetResult<Booking> {
        let mut store = self.store.lock().await;
        if let Some(resource_id) = &request.resource_id {
            store.resource(resource_id)?;
        }
        let booking = Booking::new(request, Utc::now())?;
        let mut staged = store.clone();
        staged.bookings.insert(booking.id.clone(), booking.clone());
        self.commit(&mut store, staged, Table::Bookings)?;
        tracing::info!(booking = %booking.id, requester = %booking.requester, "booking requested");
        Ok(booking)
    }

    async fn list_resources(&self) -> FleetResult<Vec<Resource>> {
        let store = self.store.lock().await;
        let mut resources: Vec<Resource> = store.resources.values().cloned().collect();
        resources.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
        Ok(resources)
    }

    async fn get_resource(&self, id: &ResourceId) -> FleetResult<Resource> {
        let store = self.store.lock().await;
        store.resource(id).cloned()
    }

    async fn create_resource(&self, request: NewResource) -> FleetResult<Resource> {
        if request.label.trim().is_empty() {
            return Err(FleetError::MalformedRecord("resource without label".into()));
        }
        let mut store = self.store.lock().await;
        let resource = Resource {
            id: ResourceId::new_random(),
            label: request.label.trim().to_string(),
            kind: request.kind,
            status: ResourceStatus::Available,
            in_use: false,
            quantity: request.quantity,
            available_quantity: request.quantity,
            image_url: request.image_url,
        };
        let mut staged = store.clone();
        staged.resources.insert(resource.id.clone(), resource.clone());
        self.commit(&mut store, staged, Table::Resources)?;
        Ok(resource)
    }

    async fn set_resource_status(
        &self,
        id: &ResourceId,
        status: ResourceStatus,
    ) -> FleetResult<Resource> {
        let mut store = self.store.lock().await;
        let resource = self.update_resource(&mut store, id, |r| r.status = status)?;
        tracing::info!(resource = %id, %status, "resource status changed");
        Ok(resource)
    }

    async fn set_in_use(&self, id: &ResourceId, in_use: bool) -> FleetResult<Resource> {
        let mut store = self.store.lock().await;
        self.update_resource(&mut store, id, |r| {
            r.in_use = in_use;
            if let (Some(total), Some(available)) = (r.quantity, r.available_quantity) {
                r.available_quantity = Some(if in_use {
                    available.saturating_sub(1)
                } else {
                    (available + 1).min(total)
                });
                r.in_use = r.available_quantity == Some(0);
            }
        })
    }

    async fn assignment_map(&self) -> FleetResult<AssignmentMap> {
        let store = self.store.lock().await;
        let mut approved: Vec<&Booking> = store
            .bookings
            .values()
            .filter(|b| b.status.holds_resource())
            .collect();
        approved.sort_by_key(|b| b.window.sort_key());

        let mut map = AssignmentMap::new();
        for booking in approved {
            if let Some(resource_id) = booking.occupied_resource() {
                map.entry(resource_id.clone())
                    .or_default()
                    .push(booking.id.clone());
            }
        }
        Ok(map)
    }

    async fn find_overlapping(
        &self,
        resource_id: &ResourceId,
        window: &BookingWindow,
        exclude: Option<&BookingId>,
    ) -> FleetResult<Option<Booking>> {
        let store = self.store.lock().await;
        Ok(first_overlap(store.bookings.values(), resource_id, window, exclude).cloned())
    }

    async fn assign_resource(
        &self,
        booking_id: &BookingId,
        resource_id: &ResourceId,
    ) -> FleetResult<Booking> {
        let mut store = self.store.lock().await;
        let booking = store.booking(booking_id)?;
        booking.ensure_allows(Transition::Assign)?;
        let resource = store.resource(resource_id)?;

        if let Some(conflict) = find_conflict(
            resource,
            &booking.window,
            Some(booking_id),
            store.bookings.values(),
        ) {
            tracing::info!(booking = %booking_id, %conflict, "assignment refused");
            return Err(conflict.into());
        }

        let now = Utc::now();
        let mut staged = store.clone();
        let booking = staged
            .bookings
            .get_mut(booking_id)
            .ok_or_else(|| FleetError::BookingNotFound(booking_id.clone()))?;
        booking.apply(Transition::Assign, now)?;
        booking.assigned_resource_id = Some(resource_id.clone());
        let booking = booking.clone();

        self.commit(&mut store, staged, Table::Bookings)?;
        tracing::info!(booking = %booking_id, resource = %resource_id, "resource assigned");
        Ok(booking)
    }

    async fn change_status(
        &self,
        booking_id: &BookingId,
        change: StatusChange,
    ) -> FleetResult<Booking> {
        let mut store = self.store.lock().await;
        let transition = change.transition();
        let booking = store.booking(booking_id)?;
        booking.ensure_allows(transition)?;

        if transition == Transition::Approve {
            let resource_id = booking
                .occupied_resource()
                .ok_or_else(|| FleetError::NoResourceAssigned(booking_id.clone()))?;
            let resource = store.resource(resource_id)?;
            if let Some(conflict) = find_conflict(
                resource,
                &booking.window,
                Some(booking_id),
                store.bookings.values(),
            ) {
                tracing::info!(booking = %booking_id, %conflict, "approval refused");
                return Err(conflict.into());
            }
        }

        let now = Utc::now();
        let mut staged = store.clone();
        let booking = staged
            .bookings
            .get_mut(booking_id)
            .ok_or_else(|| FleetError::BookingNotFound(booking_id.clone()))?;
        match change {
            StatusChange::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(FleetError::MissingReason);
                }
                booking.apply(transition, now)?;
                booking.rejection_reason = Some(reason.to_string());
            }
            _ => booking.apply(transition, now)?,
        }
        let booking = booking.clone();

        self.commit(&mut store, staged, Table::Bookings)?;
        tracing::info!(booking = %booking_id, status = %booking.status, "booking status changed");
        Ok(booking)
    }

    fn subscribe(&self, tables: &[Table]) -> FleetResult<Subscription> {
        Ok(self.feed.subscribe(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::Conflict;
    use crate::resource::ResourceKind;
    use crate::test_support::range;

    async fn add_car(backend: &MemoryBackend, label: &str) -> Resource {
        backend
            .create_resource(NewResource {
                label: label.into(),
                kind: ResourceKind::Car,
                quantity: None,
                image_url: None,
            })
            .await
            .unwrap()
    }

    async fn request(backend: &MemoryBackend, window: BookingWindow) -> Booking {
        backend
            .create_booking(NewBooking {
                requester: "ana".into(),
                window,
                resource_id: None,
                purpose: Some("site visit".into()),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_approve_requires_assignment() {
        let backend = MemoryBackend::new();
        let booking = request(&backend, range(9, 0, 10, 0)).await;

        let err = backend
            .change_status(&booking.id, StatusChange::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::NoResourceAssigned(_)));
    }

    #[tokio::test]
    async fn test_overlapping_approval_is_refused_and_booking_stays_pending() {
        let backend = MemoryBackend::new();
        let r1 = add_car(&backend, "R1").await;

        let a = request(&backend, range(9, 0, 10, 0)).await;
        backend.assign_resource(&a.id, &r1.id).await.unwrap();
        backend
            .change_status(&a.id, StatusChange::Approve)
            .await
            .unwrap();

        let b = request(&backend, range(9, 30, 10, 30)).await;
        // Pending bookings can hold the same assignment; approval is the gate
        let conflict = backend.assign_resource(&b.id, &r1.id).await.unwrap_err();
        assert!(matches!(
            conflict,
            FleetError::Conflict(Conflict::ScheduleOverlap { .. })
        ));

        let b = backend.get_booking(&b.id).await.unwrap();
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.assigned_resource_id, None);
    }

    #[tokio::test]
    async fn test_concurrent_approvals_admit_exactly_one() {
        let backend = Arc::new(MemoryBackend::new());
        let r1 = add_car(&backend, "R1").await;

        let mut ids = Vec::new();
        for _ in 0..8 {
            let b = request(&backend, range(9, 0, 10, 0)).await;
            // Insert the assignment directly so every booking races on approval
            let mut assigned = b.clone();
            assigned.assigned_resource_id = Some(r1.id.clone());
            backend.insert_booking(assigned).await.unwrap();
            ids.push(b.id);
        }

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { backend.change_status(&id, StatusChange::Approve).await })
            })
            .collect();

        let mut approved = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => approved += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(approved, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_no_two_approved_bookings_overlap_after_any_sequence() {
        let backend = MemoryBackend::new();
        let cars = [
            add_car(&backend, "A").await,
            add_car(&backend, "B").await,
        ];

        // Deterministic pseudo-random walk over windows, resources and actions
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move |n: u64| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed % n
        };

        let mut bookings = Vec::new();
        for _ in 0..60 {
            let start = next(20) as u32;
            let len = 1 + next(4) as u32;
            let window = range(start, 0, (start + len).min(23), 30);
            bookings.push(request(&backend, window).await.id);
        }
        for _ in 0..200 {
            let id = &bookings[next(bookings.len() as u64) as usize];
            let car = &cars[next(2) as usize];
            let _ = match next(4) {
                0 | 1 => backend.assign_resource(id, &car.id).await,
                2 => backend.change_status(id, StatusChange::Approve).await,
                _ => backend.change_status(id, StatusChange::Cancel).await,
            };
        }

        let approved = backend.list_bookings(BookingStatus::Approved).await.unwrap();
        for (i, a) in approved.iter().enumerate() {
            for b in &approved[i + 1..] {
                assert!(!a.competes_with(b), "{} overlaps {}", a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_reject_requires_reason() {
        let backend = MemoryBackend::new();
        let booking = request(&backend, range(9, 0, 10, 0)).await;

        let err = backend
            .change_status(&booking.id, StatusChange::Reject { reason: "  ".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::MissingReason));

        let rejected = backend
            .change_status(
                &booking.id,
                StatusChange::Reject {
                    reason: "no drivers".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, BookingStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("no drivers"));
    }

    #[tokio::test]
    async fn test_reassignment_after_completion_is_refused() {
        let backend = MemoryBackend::new();
        let r1 = add_car(&backend, "R1").await;
        let r2 = add_car(&backend, "R2").await;
        let booking = request(&backend, range(9, 0, 10, 0)).await;
        backend.assign_resource(&booking.id, &r1.id).await.unwrap();
        backend
            .change_status(&booking.id, StatusChange::Approve)
            .await
            .unwrap();

        // Reassignment while approved is fine
        let moved = backend.assign_resource(&booking.id, &r2.id).await.unwrap();
        assert_eq!(moved.assigned_resource_id, Some(r2.id.clone()));

        backend
            .change_status(&booking.id, StatusChange::Complete)
            .await
            .unwrap();
        let err = backend
            .assign_resource(&booking.id, &r1.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_gear_units_track_check_out() {
        let backend = MemoryBackend::new();
        let gear = backend
            .create_resource(NewResource {
                label: "Headlamp".into(),
                kind: ResourceKind::Gear,
                quantity: Some(2),
                image_url: None,
            })
            .await
            .unwrap();

        let one_out = backend.set_in_use(&gear.id, true).await.unwrap();
        assert_eq!(one_out.available_quantity, Some(1));
        assert!(one_out.check_assignable().is_ok());

        let all_out = backend.set_in_use(&gear.id, true).await.unwrap();
        assert_eq!(all_out.available_quantity, Some(0));
        assert!(all_out.check_assignable().is_err());

        let returned = backend.set_in_use(&gear.id, false).await.unwrap();
        assert_eq!(returned.available_quantity, Some(1));
        assert!(!returned.in_use);
    }

    #[tokio::test]
    async fn test_assignment_map_lists_approved_holders() {
        let backend = MemoryBackend::new();
        let r1 = add_car(&backend, "R1").await;
        let early = request(&backend, range(8, 0, 9, 0)).await;
        let late = request(&backend, range(14, 0, 15, 0)).await;
        let pending = request(&backend, range(11, 0, 12, 0)).await;
        for b in [&late, &early] {
            backend.assign_resource(&b.id, &r1.id).await.unwrap();
            backend.change_status(&b.id, StatusChange::Approve).await.unwrap();
        }
        backend.assign_resource(&pending.id, &r1.id).await.unwrap();

        let map = backend.assignment_map().await.unwrap();
        assert_eq!(map.get(&r1.id), Some(&vec![early.id, late.id]));
    }

    #[tokio::test]
    async fn test_mutations_publish_changes() {
        let backend = MemoryBackend::new();
        let mut sub = backend.subscribe(&[Table::Bookings]).unwrap();
        request(&backend, range(9, 0, 10, 0)).await;
        assert_eq!(sub.next().await.unwrap().table, Table::Bookings);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("fleetdesk-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("store.json");

        let backend = MemoryBackend::open(&path).unwrap();
        let car = add_car(&backend, "R1").await;
        let booking = request(&backend, range(9, 0, 10, 0)).await;
        backend.assign_resource(&booking.id, &car.id).await.unwrap();
        drop(backend);

        let reopened = MemoryBackend::open(&path).unwrap();
        let booking = reopened.get_booking(&booking.id).await.unwrap();
        assert_eq!(booking.assigned_resource_id, Some(car.id));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_failed_save_leaves_store_untouched() {
        let dir = std::env::temp_dir().join(format!("fleetdesk-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("store.json");

        let backend = MemoryBackend::open(&path).unwrap();
        let car = add_car(&backend, "R1").await;
        let booking = request(&backend, range(9, 0, 10, 0)).await;
        let mut changes = backend.feed().receiver();

        // A directory where the temp file goes makes the write fail
        let tmp = path.with_extension("json.tmp");
        std::fs::create_dir_all(&tmp).unwrap();

        let err = backend.assign_resource(&booking.id, &car.id).await.unwrap_err();
        assert!(matches!(err, FleetError::Io(_)), "got {:?}", err);
        let live = backend.get_booking(&booking.id).await.unwrap();
        assert_eq!(live.assigned_resource_id, None);
        assert_eq!(live.status, BookingStatus::Pending);

        let err = backend
            .set_resource_status(&car.id, ResourceStatus::Maintenance)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Io(_)));
        let live = backend.get_resource(&car.id).await.unwrap();
        assert_eq!(live.status, ResourceStatus::Available);
        assert!(changes.try_recv().is_err(), "nothing published for a failed write");

        std::fs::remove_dir_all(&tmp).unwrap();
        backend.assign_resource(&booking.id, &car.id).await.unwrap();
        drop(backend);

        let reopened = MemoryBackend::open(&path).unwrap();
        let booking = reopened.get_booking(&booking.id).await.unwrap();
        assert_eq!(booking.assigned_resource_id, Some(car.id));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
