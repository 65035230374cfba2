//! In-process datastore with optimistic concurrency control.
//!
//! Every transaction reads from a snapshot taken when it begins and buffers
//! its writes. Each commit gets the next sequence number and stamps it on
//! the keys it wrote. At commit, a key the transaction read or wrote that
//! carries a stamp newer than the transaction's begin means a concurrent
//! transaction committed first, and the commit fails with
//! [`StoreError::SerializationConflict`]. Keys are coarse enough (a
//! vehicle's whole location history, all rides of a vehicle or user) to
//! cover the predicate reads the fleet performs, so committed histories are
//! serializable. Every isolation level gets this behaviour.
//!
//! Snapshots copy the whole table set, so this backend suits tests and
//! single-process deployments with small fleets, not production volumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use uuid::Uuid;

use super::{Datastore, FleetTransaction, IsolationLevel};
use crate::error::StoreError;
use crate::models::{
    ActiveRide, ClosedRide, LocationHistory, Ride, RideSummary, User, Vehicle, VehicleInfo,
    VehicleWithLocation,
};
use sqlx::types::Json;

const DEFAULT_MAX_CONNECTIONS: usize = 16;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    /// Membership of the vehicles table.
    Fleet,
    Vehicle(Uuid),
    Locations(Uuid),
    Ride(Uuid),
    VehicleRides(Uuid),
    UserRides(String),
    User(String),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    vehicles: HashMap<Uuid, Vehicle>,
    locations: HashMap<Uuid, Vec<LocationHistory>>,
    rides: HashMap<Uuid, Ride>,
    users: HashMap<String, User>,
}

#[derive(Debug, Clone)]
enum Write {
    PutVehicle(Vehicle),
    DeleteVehicle(Uuid),
    InsertLocation(LocationHistory),
    PutRide(Ride),
    PutUser(User),
    DeleteUser(String),
}

impl Tables {
    fn apply(&mut self, write: &Write) {
        match write {
            Write::PutVehicle(vehicle) => {
                self.vehicles.insert(vehicle.id, vehicle.clone());
            }
            Write::DeleteVehicle(id) => {
                // ON DELETE CASCADE
                self.vehicles.remove(id);
                self.locations.remove(id);
                self.rides.retain(|_, ride| ride.vehicle_id != *id);
            }
            Write::InsertLocation(location) => {
                self.locations
                    .entry(location.vehicle_id)
                    .or_default()
                    .push(location.clone());
            }
            Write::PutRide(ride) => {
                self.rides.insert(ride.id, ride.clone());
            }
            Write::PutUser(user) => {
                self.users.insert(user.email.clone(), user.clone());
            }
            Write::DeleteUser(email) => {
                self.users.remove(email);
            }
        }
    }

    fn last_location(&self, vehicle_id: Uuid) -> Option<&LocationHistory> {
        // max_by_key keeps the last of equal maxima, i.e. the latest insert
        self.locations
            .get(&vehicle_id)
            .and_then(|rows| rows.iter().max_by_key(|row| row.ts))
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: Tables,
    /// Sequence number of the last commit that wrote each key.
    versions: HashMap<Key, u64>,
    commit_seq: u64,
    /// Open transactions, counted by the sequence number they began at.
    open: BTreeMap<u64, usize>,
    /// Keys of deleted rows and the commit that deleted them.
    tombstones: Vec<(Key, u64)>,
    next_serial: i64,
    injected_conflicts: u32,
}

impl Shared {
    fn version(&self, key: &Key) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn register(&mut self) -> u64 {
        *self.open.entry(self.commit_seq).or_insert(0) += 1;
        self.commit_seq
    }

    /// Forgets a finished transaction and prunes the versions of deleted
    /// rows that no open transaction can still conflict on.
    fn release(&mut self, begin_seq: u64) {
        if let Some(count) = self.open.get_mut(&begin_seq) {
            *count -= 1;
            if *count == 0 {
                self.open.remove(&begin_seq);
            }
        }

        // a stamp at or below every open begin never causes a conflict,
        // so dropping it changes no validation outcome
        let watermark = self.open.keys().next().copied().unwrap_or(u64::MAX);
        let versions = &mut self.versions;
        self.tombstones.retain(|(key, deleted_at)| {
            if *deleted_at > watermark {
                return true;
            }
            if versions.get(key) == Some(deleted_at) {
                versions.remove(key);
            }
            false
        });
    }
}

/// Shared handle; clones see the same data.
#[derive(Clone)]
pub struct MemoryDatastore {
    shared: Arc<Mutex<Shared>>,
    connections: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::with_pool(DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// At most `max_connections` transactions are open at once; `begin`
    /// waits up to `acquire_timeout` for a slot before failing with
    /// [`StoreError::PoolExhausted`].
    pub fn with_pool(max_connections: usize, acquire_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            connections: Arc::new(Semaphore::new(max_connections.max(1))),
            acquire_timeout,
        }
    }

    /// Makes the next `count` commits fail with a serialization conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.shared.lock().injected_conflicts += count;
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Box<dyn FleetTransaction>, StoreError> {
        let permit = tokio::time::timeout(
            self.acquire_timeout,
            self.connections.clone().acquire_owned(),
        )
        .await
        .map_err(|_| StoreError::PoolExhausted)?
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let (view, begin_seq) = {
            let mut shared = self.shared.lock();
            (shared.tables.clone(), shared.register())
        };
        debug!("Opened in-memory transaction at {}", isolation);

        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            view,
            begin_seq,
            reads: HashSet::new(),
            written: HashSet::new(),
            deleted: Vec::new(),
            writes: Vec::new(),
            _permit: permit,
        }))
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    /// Snapshot at begin plus this transaction's own writes.
    view: Tables,
    begin_seq: u64,
    reads: HashSet<Key>,
    written: HashSet<Key>,
    /// Keys whose rows this transaction deletes.
    deleted: Vec<Key>,
    writes: Vec<Write>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.shared.lock().release(self.begin_seq);
    }
}

impl MemoryTransaction {
    fn read(&mut self, key: Key) {
        self.reads.insert(key);
    }

    fn stage(&mut self, keys: impl IntoIterator<Item = Key>, write: Write) {
        self.written.extend(keys);
        self.view.apply(&write);
        self.writes.push(write);
    }

    fn vehicle_exists(&mut self, id: Uuid) -> bool {
        self.read(Key::Vehicle(id));
        self.view.vehicles.contains_key(&id)
    }

    fn snapshot_of(&self, vehicle: &Vehicle, location: &LocationHistory) -> VehicleWithLocation {
        VehicleWithLocation {
            vehicle_id: vehicle.id,
            in_use: vehicle.in_use,
            battery: vehicle.battery,
            vehicle_info: vehicle.vehicle_info.clone(),
            last_checkin: location.ts,
            last_latitude: location.latitude,
            last_longitude: location.longitude,
        }
    }

    fn validate_and_apply(&self, shared: &mut Shared) -> Result<(), StoreError> {
        if shared.injected_conflicts > 0 {
            shared.injected_conflicts -= 1;
            return Err(StoreError::SerializationConflict(
                "injected conflict".to_string(),
            ));
        }

        for key in self.reads.iter().chain(self.written.iter()) {
            if shared.version(key) > self.begin_seq {
                return Err(StoreError::SerializationConflict(format!(
                    "{:?} was modified by a concurrent transaction",
                    key
                )));
            }
        }

        shared.commit_seq += 1;
        let seq = shared.commit_seq;
        for write in &self.writes {
            shared.tables.apply(write);
        }
        for key in &self.written {
            shared.versions.insert(key.clone(), seq);
        }
        for key in &self.deleted {
            shared.tombstones.push((key.clone(), seq));
        }
        Ok(())
    }

    fn set_in_use(&mut self, id: Uuid, from: bool, to: bool, battery: Option<i32>) -> bool {
        self.read(Key::Vehicle(id));
        let Some(vehicle) = self.view.vehicles.get(&id) else {
            return false;
        };
        if vehicle.in_use != from {
            return false;
        }
        let mut updated = vehicle.clone();
        updated.in_use = to;
        if let Some(battery) = battery {
            updated.battery = battery;
        }
        self.stage([Key::Vehicle(id)], Write::PutVehicle(updated));
        true
    }
}

#[async_trait]
impl FleetTransaction for MemoryTransaction {
    async fn insert_vehicle(
        &mut self,
        id: Uuid,
        battery: i32,
        vehicle_info: &VehicleInfo,
    ) -> Result<Vehicle, StoreError> {
        if self.vehicle_exists(id) {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate key: vehicles.id {}",
                id
            )));
        }
        // sequences are not transactional
        let serial_number = {
            let mut shared = self.shared.lock();
            shared.next_serial += 1;
            shared.next_serial
        };
        let vehicle = Vehicle {
            id,
            in_use: false,
            battery,
            vehicle_info: Json(vehicle_info.clone()),
            serial_number,
        };
        self.stage(
            [Key::Fleet, Key::Vehicle(id)],
            Write::PutVehicle(vehicle.clone()),
        );
        Ok(vehicle)
    }

    async fn fetch_vehicle(&mut self, id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        self.read(Key::Vehicle(id));
        Ok(self.view.vehicles.get(&id).cloned())
    }

    async fn fetch_vehicles_with_last_location(
        &mut self,
        limit: i64,
    ) -> Result<Vec<VehicleWithLocation>, StoreError> {
        self.read(Key::Fleet);
        let ids: Vec<Uuid> = self.view.vehicles.keys().copied().collect();
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            self.read(Key::Vehicle(id));
            self.read(Key::Locations(id));
            let (Some(vehicle), Some(location)) =
                (self.view.vehicles.get(&id), self.view.last_location(id))
            else {
                continue;
            };
            rows.push(self.snapshot_of(vehicle, location));
        }
        rows.sort_by(|a, b| b.last_checkin.cmp(&a.last_checkin));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn claim_vehicle(&mut self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.set_in_use(id, false, true, None))
    }

    async fn release_vehicle(&mut self, id: Uuid, battery: i32) -> Result<bool, StoreError> {
        Ok(self.set_in_use(id, true, false, Some(battery)))
    }

    async fn delete_idle_vehicle(&mut self, id: Uuid) -> Result<bool, StoreError> {
        self.read(Key::Vehicle(id));
        match self.view.vehicles.get(&id) {
            Some(vehicle) if !vehicle.in_use => {}
            _ => return Ok(false),
        }
        let mut dead = vec![Key::Vehicle(id), Key::Locations(id), Key::VehicleRides(id)];
        let mut keys = vec![Key::Fleet];
        for ride in self.view.rides.values().filter(|r| r.vehicle_id == id) {
            dead.push(Key::Ride(ride.id));
            keys.push(Key::UserRides(ride.user_email.clone()));
        }
        keys.extend(dead.iter().cloned());
        self.deleted.extend(dead);
        self.stage(keys, Write::DeleteVehicle(id));
        Ok(true)
    }

    async fn last_location(
        &mut self,
        vehicle_id: Uuid,
    ) -> Result<Option<LocationHistory>, StoreError> {
        self.read(Key::Locations(vehicle_id));
        Ok(self.view.last_location(vehicle_id).cloned())
    }

    async fn insert_location(&mut self, location: &LocationHistory) -> Result<(), StoreError> {
        if !self.vehicle_exists(location.vehicle_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "location_history.vehicle_id {} references a missing vehicle",
                location.vehicle_id
            )));
        }
        self.stage(
            [Key::Locations(location.vehicle_id)],
            Write::InsertLocation(location.clone()),
        );
        Ok(())
    }

    async fn location_history(
        &mut self,
        vehicle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LocationHistory>, StoreError> {
        self.read(Key::Locations(vehicle_id));
        let mut rows = self
            .view
            .locations
            .get(&vehicle_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by(|a, b| b.ts.cmp(&a.ts));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn insert_ride(&mut self, ride: &Ride) -> Result<(), StoreError> {
        if !self.vehicle_exists(ride.vehicle_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "rides.vehicle_id {} references a missing vehicle",
                ride.vehicle_id
            )));
        }
        self.read(Key::Ride(ride.id));
        if self.view.rides.contains_key(&ride.id) {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate key: rides.id {}",
                ride.id
            )));
        }
        if ride.is_active() {
            self.read(Key::VehicleRides(ride.vehicle_id));
            let already_open = self
                .view
                .rides
                .values()
                .any(|r| r.vehicle_id == ride.vehicle_id && r.is_active());
            if already_open {
                return Err(StoreError::ConstraintViolation(format!(
                    "rides_one_open_per_vehicle_idx: vehicle {} already has an open ride",
                    ride.vehicle_id
                )));
            }
        }
        self.stage(
            [
                Key::Ride(ride.id),
                Key::VehicleRides(ride.vehicle_id),
                Key::UserRides(ride.user_email.clone()),
            ],
            Write::PutRide(ride.clone()),
        );
        Ok(())
    }

    async fn fetch_ride(&mut self, id: Uuid) -> Result<Option<Ride>, StoreError> {
        self.read(Key::Ride(id));
        Ok(self.view.rides.get(&id).cloned())
    }

    async fn open_ride_for_vehicle(
        &mut self,
        vehicle_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        self.read(Key::VehicleRides(vehicle_id));
        Ok(self
            .view
            .rides
            .values()
            .find(|r| r.vehicle_id == vehicle_id && r.is_active())
            .map(|r| r.id))
    }

    async fn close_ride(
        &mut self,
        id: Uuid,
        end_ts: DateTime<Utc>,
    ) -> Result<Option<ClosedRide>, StoreError> {
        self.read(Key::Ride(id));
        let Some(ride) = self.view.rides.get(&id).filter(|r| r.is_active()) else {
            return Ok(None);
        };
        let mut closed = ride.clone();
        closed.end_ts = Some(end_ts);
        let result = ClosedRide {
            vehicle_id: closed.vehicle_id,
            start_ts: closed.start_ts,
        };
        self.stage(
            [
                Key::Ride(id),
                Key::VehicleRides(closed.vehicle_id),
                Key::UserRides(closed.user_email.clone()),
            ],
            Write::PutRide(closed),
        );
        Ok(Some(result))
    }

    async fn active_ride(
        &mut self,
        vehicle_id: Uuid,
        user_email: &str,
    ) -> Result<Option<ActiveRide>, StoreError> {
        self.read(Key::VehicleRides(vehicle_id));
        self.read(Key::Vehicle(vehicle_id));
        self.read(Key::Locations(vehicle_id));

        let Some(vehicle) = self.view.vehicles.get(&vehicle_id).filter(|v| v.in_use) else {
            return Ok(None);
        };
        let Some(ride) = self.view.rides.values().find(|r| {
            r.vehicle_id == vehicle_id && r.user_email == user_email && r.is_active()
        }) else {
            return Ok(None);
        };
        let start = self
            .view
            .locations
            .get(&vehicle_id)
            .and_then(|rows| rows.iter().rev().find(|row| row.ts == ride.start_ts));
        Ok(start.map(|location| ActiveRide {
            ride_id: ride.id,
            vehicle: self.snapshot_of(vehicle, location),
        }))
    }

    async fn rides_by_user(&mut self, user_email: &str) -> Result<Vec<RideSummary>, StoreError> {
        self.read(Key::UserRides(user_email.to_string()));
        let rides: Vec<Ride> = self
            .view
            .rides
            .values()
            .filter(|r| r.user_email == user_email)
            .cloned()
            .collect();

        let mut summaries = Vec::with_capacity(rides.len());
        for ride in rides {
            self.read(Key::Vehicle(ride.vehicle_id));
            let Some(vehicle) = self.view.vehicles.get(&ride.vehicle_id) else {
                continue;
            };
            summaries.push(RideSummary {
                ride_id: ride.id,
                vehicle_id: ride.vehicle_id,
                vehicle_info: vehicle.vehicle_info.clone(),
                start_ts: ride.start_ts,
                end_ts: ride.end_ts,
                in_use: vehicle.in_use,
            });
        }
        summaries.sort_by(|a, b| b.start_ts.cmp(&a.start_ts));
        Ok(summaries)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.read(Key::User(user.email.clone()));
        if self.view.users.contains_key(&user.email) {
            return Err(StoreError::ConstraintViolation(format!(
                "duplicate key: users.email {}",
                user.email
            )));
        }
        self.stage([Key::User(user.email.clone())], Write::PutUser(user.clone()));
        Ok(())
    }

    async fn fetch_user(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        self.read(Key::User(email.to_string()));
        Ok(self.view.users.get(email).cloned())
    }

    async fn delete_user(&mut self, email: &str) -> Result<bool, StoreError> {
        self.read(Key::User(email.to_string()));
        if !self.view.users.contains_key(email) {
            return Ok(false);
        }
        self.deleted.push(Key::User(email.to_string()));
        self.stage(
            [Key::User(email.to_string())],
            Write::DeleteUser(email.to_string()),
        );
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut shared = self.shared.lock();
        let result = self.validate_and_apply(&mut shared);
        // release the lock before Drop takes it again
        drop(shared);
        result
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // buffered writes are discarded with the transaction
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> VehicleInfo {
        VehicleInfo {
            vehicle_type: "scooter".to_string(),
            color: "red".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = MemoryDatastore::new();
        let id = Uuid::new_v4();

        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        tx.insert_vehicle(id, 90, &info()).await.unwrap();
        assert!(tx.fetch_vehicle(id).await.unwrap().is_some());
        tx.rollback().await.unwrap();

        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(tx.fetch_vehicle(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_conflict_at_commit() {
        let store = MemoryDatastore::new();
        let id = Uuid::new_v4();
        let mut setup = store.begin(IsolationLevel::Serializable).await.unwrap();
        setup.insert_vehicle(id, 90, &info()).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin(IsolationLevel::Serializable).await.unwrap();
        let mut second = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(first.claim_vehicle(id).await.unwrap());
        assert!(second.claim_vehicle(id).await.unwrap());

        first.commit().await.unwrap();
        assert!(matches!(
            second.commit().await,
            Err(StoreError::SerializationConflict(_))
        ));

        let mut check = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(!check.claim_vehicle(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_pool_exhaustion_is_reported() {
        let store = MemoryDatastore::with_pool(1, Duration::from_millis(20));
        let _held = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(matches!(
            store.begin(IsolationLevel::Serializable).await,
            Err(StoreError::PoolExhausted)
        ));
    }

    #[tokio::test]
    async fn test_connection_released_when_transaction_dropped() {
        let store = MemoryDatastore::with_pool(1, Duration::from_millis(20));
        let tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        drop(tx);
        assert!(store.begin(IsolationLevel::Serializable).await.is_ok());
    }

    #[tokio::test]
    async fn test_location_requires_existing_vehicle() {
        let store = MemoryDatastore::new();
        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        let orphan = LocationHistory::new(Uuid::new_v4(), Utc::now(), 1.0, 2.0);
        assert!(matches!(
            tx.insert_location(&orphan).await,
            Err(StoreError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_history() {
        let store = MemoryDatastore::new();
        let id = Uuid::new_v4();
        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        tx.insert_vehicle(id, 50, &info()).await.unwrap();
        tx.insert_location(&LocationHistory::new(id, Utc::now(), 1.0, 2.0))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(tx.delete_idle_vehicle(id).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(tx.location_history(id, 10).await.unwrap().is_empty());
    }

    fn tracks(store: &MemoryDatastore, key: &Key) -> bool {
        store.shared.lock().versions.contains_key(key)
    }

    #[tokio::test]
    async fn test_deleted_rows_stop_being_tracked_once_no_reader_predates_them() {
        let store = MemoryDatastore::new();
        let id = Uuid::new_v4();
        let ride = Ride {
            id: Uuid::new_v4(),
            vehicle_id: id,
            user_email: "a@x.com".to_string(),
            start_ts: Utc::now(),
            end_ts: Some(Utc::now()),
        };
        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        tx.insert_vehicle(id, 50, &info()).await.unwrap();
        tx.insert_ride(&ride).await.unwrap();
        tx.commit().await.unwrap();

        // opened before the delete and reads the vehicle
        let mut old = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(old.fetch_vehicle(id).await.unwrap().is_some());

        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(tx.delete_idle_vehicle(id).await.unwrap());
        tx.commit().await.unwrap();

        assert!(tracks(&store, &Key::Vehicle(id)));
        assert!(matches!(
            old.commit().await,
            Err(StoreError::SerializationConflict(_))
        ));

        assert!(!tracks(&store, &Key::Vehicle(id)));
        assert!(!tracks(&store, &Key::Locations(id)));
        assert!(!tracks(&store, &Key::VehicleRides(id)));
        assert!(!tracks(&store, &Key::Ride(ride.id)));
        assert!(tracks(&store, &Key::Fleet));
        assert!(store.shared.lock().tombstones.is_empty());

        let user = User {
            email: "a@x.com".to_string(),
            last_name: "L".to_string(),
            first_name: "F".to_string(),
            phone_numbers: vec![],
        };
        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(tx.delete_user(&user.email).await.unwrap());
        tx.commit().await.unwrap();
        assert!(!tracks(&store, &Key::User(user.email.clone())));
    }
}
