//! Datastore Gateway: the transaction abstraction the fleet operations run on.
//!
//! A [`Datastore`] hands out one [`FleetTransaction`] per operation attempt.
//! The transaction exposes the typed statements the fleet needs; every
//! conditional write reports whether it applied so callers can tell a lost
//! race from success. Dropping a transaction without committing discards
//! its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    ActiveRide, ClosedRide, LocationHistory, Ride, RideSummary, User, Vehicle, VehicleInfo,
    VehicleWithLocation,
};

pub mod memory;

pub use memory::MemoryDatastore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[async_trait]
pub trait Datastore: Send + Sync {
    /// Acquires a connection and opens a transaction on it.
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Box<dyn FleetTransaction>, StoreError>;
}

#[async_trait]
pub trait FleetTransaction: Send {
    // vehicles

    /// Inserts an idle vehicle; the store assigns its serial number.
    async fn insert_vehicle(
        &mut self,
        id: Uuid,
        battery: i32,
        vehicle_info: &VehicleInfo,
    ) -> Result<Vehicle, StoreError>;

    async fn fetch_vehicle(&mut self, id: Uuid) -> Result<Option<Vehicle>, StoreError>;

    /// Each vehicle joined to its most recent location, newest first.
    async fn fetch_vehicles_with_last_location(
        &mut self,
        limit: i64,
    ) -> Result<Vec<VehicleWithLocation>, StoreError>;

    /// `in_use = false -> true`. Returns false if the vehicle was missing or already in use.
    async fn claim_vehicle(&mut self, id: Uuid) -> Result<bool, StoreError>;

    /// `in_use = true -> false` and records the battery level.
    async fn release_vehicle(&mut self, id: Uuid, battery: i32) -> Result<bool, StoreError>;

    /// Deletes the vehicle only while it is idle.
    async fn delete_idle_vehicle(&mut self, id: Uuid) -> Result<bool, StoreError>;

    // location history

    async fn last_location(
        &mut self,
        vehicle_id: Uuid,
    ) -> Result<Option<LocationHistory>, StoreError>;

    async fn insert_location(&mut self, location: &LocationHistory) -> Result<(), StoreError>;

    /// Newest first.
    async fn location_history(
        &mut self,
        vehicle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LocationHistory>, StoreError>;

    // rides

    async fn insert_ride(&mut self, ride: &Ride) -> Result<(), StoreError>;

    async fn fetch_ride(&mut self, id: Uuid) -> Result<Option<Ride>, StoreError>;

    async fn open_ride_for_vehicle(&mut self, vehicle_id: Uuid)
        -> Result<Option<Uuid>, StoreError>;

    /// Sets `end_ts` on a ride that is still open.
    async fn close_ride(
        &mut self,
        id: Uuid,
        end_ts: DateTime<Utc>,
    ) -> Result<Option<ClosedRide>, StoreError>;

    async fn active_ride(
        &mut self,
        vehicle_id: Uuid,
        user_email: &str,
    ) -> Result<Option<ActiveRide>, StoreError>;

    /// Most recent first.
    async fn rides_by_user(&mut self, user_email: &str) -> Result<Vec<RideSummary>, StoreError>;

    // users

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;

    async fn fetch_user(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    async fn delete_user(&mut self, email: &str) -> Result<bool, StoreError>;

    // completion

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
