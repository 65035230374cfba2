//! Ride Lifecycle Manager.
//!
//! Per vehicle: `Idle -> Active` on StartRide, `Active -> Idle` on EndRide.
//! Both transitions flip `vehicles.in_use` with a conditional update and
//! write their LocationHistory row in the same transaction, so a lost race
//! shows up as a failed condition (or a serialization conflict) rather than
//! a second open ride.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use super::{now, validate_battery, validate_coordinates, validate_email};
use crate::error::{FleetError, FleetResult};
use crate::models::{ActiveRide, LocationHistory, Ride, RideSummary};
use crate::store::FleetTransaction;
use crate::txn::{TransactionExecutor, UnitOfWork};

#[derive(Clone)]
pub struct RideLifecycle {
    executor: TransactionExecutor,
}

impl RideLifecycle {
    pub fn new(executor: TransactionExecutor) -> Self {
        Self { executor }
    }

    /// Fails with `NotFound` when the vehicle has no known location and
    /// `Conflict` when it is already being ridden.
    pub async fn start_ride(&self, vehicle_id: Uuid, user_email: &str) -> FleetResult<Ride> {
        validate_email(user_email)?;
        let ride = self
            .executor
            .run(&StartRide {
                vehicle_id,
                user_email: user_email.trim().to_string(),
            })
            .await?;
        info!(
            "Started ride {} on vehicle {} for {}",
            ride.id, ride.vehicle_id, ride.user_email
        );
        Ok(ride)
    }

    /// The open ride of `user_email` on `vehicle_id`, with the vehicle as it
    /// was at ride start. `NotFound` covers "not yours", "not active" and
    /// "never started" alike.
    pub async fn get_active_ride(
        &self,
        vehicle_id: Uuid,
        user_email: &str,
    ) -> FleetResult<ActiveRide> {
        validate_email(user_email)?;
        self.executor
            .run(&GetActiveRide {
                vehicle_id,
                user_email: user_email.trim().to_string(),
            })
            .await
    }

    pub async fn end_ride(
        &self,
        ride_id: Uuid,
        latitude: f64,
        longitude: f64,
        battery: i32,
        end_time: DateTime<Utc>,
    ) -> FleetResult<()> {
        validate_coordinates(latitude, longitude)?;
        validate_battery(battery)?;
        let vehicle_id = self
            .executor
            .run(&EndRide {
                ride_id,
                latitude,
                longitude,
                battery,
                end_time,
            })
            .await?;
        info!("Ended ride {} on vehicle {}", ride_id, vehicle_id);
        Ok(())
    }

    /// Most recent first.
    pub async fn get_rides_by_user(&self, user_email: &str) -> FleetResult<Vec<RideSummary>> {
        validate_email(user_email)?;
        self.executor
            .run(&RidesByUser {
                user_email: user_email.trim().to_string(),
            })
            .await
    }
}

struct StartRide {
    vehicle_id: Uuid,
    user_email: String,
}

#[async_trait]
impl UnitOfWork for StartRide {
    type Output = Ride;

    fn name(&self) -> &'static str {
        "start_ride"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<Ride> {
        let last = tx.last_location(self.vehicle_id).await?.ok_or_else(|| {
            FleetError::NotFound(format!(
                "vehicle {} has no location history",
                self.vehicle_id
            ))
        })?;

        // Checked here, inside the replayed work, so a retry after a lost
        // race sees the winner's ride.
        if let Some(open) = tx.open_ride_for_vehicle(self.vehicle_id).await? {
            return Err(FleetError::Conflict(format!(
                "vehicle {} already has active ride {}",
                self.vehicle_id, open
            )));
        }
        if !tx.claim_vehicle(self.vehicle_id).await? {
            return Err(FleetError::Conflict(format!(
                "vehicle {} is already in use",
                self.vehicle_id
            )));
        }

        // The start row must stay the newest one even if telemetry ran ahead of our clock.
        let now = now();
        let start_ts = if now > last.ts {
            now
        } else {
            last.ts + Duration::microseconds(1)
        };

        let start = LocationHistory::new(self.vehicle_id, start_ts, last.latitude, last.longitude);
        tx.insert_location(&start).await?;

        let ride = Ride {
            id: Uuid::new_v4(),
            vehicle_id: self.vehicle_id,
            user_email: self.user_email.clone(),
            start_ts,
            end_ts: None,
        };
        tx.insert_ride(&ride).await?;

        Ok(ride)
    }
}

struct GetActiveRide {
    vehicle_id: Uuid,
    user_email: String,
}

#[async_trait]
impl UnitOfWork for GetActiveRide {
    type Output = ActiveRide;

    fn name(&self) -> &'static str {
        "get_active_ride"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<ActiveRide> {
        tx.active_ride(self.vehicle_id, &self.user_email)
            .await?
            .ok_or_else(|| {
                FleetError::NotFound(format!(
                    "no active ride on vehicle {} for {}",
                    self.vehicle_id, self.user_email
                ))
            })
    }
}

struct EndRide {
    ride_id: Uuid,
    latitude: f64,
    longitude: f64,
    battery: i32,
    end_time: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for EndRide {
    /// The vehicle that was released.
    type Output = Uuid;

    fn name(&self) -> &'static str {
        "end_ride"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<Uuid> {
        let closed = match tx.close_ride(self.ride_id, self.end_time).await? {
            Some(closed) => closed,
            None => {
                return Err(match tx.fetch_ride(self.ride_id).await? {
                    Some(_) => {
                        FleetError::Conflict(format!("ride {} has already ended", self.ride_id))
                    }
                    None => FleetError::NotFound(format!("ride {}", self.ride_id)),
                });
            }
        };

        if self.end_time <= closed.start_ts {
            return Err(FleetError::Validation(format!(
                "end time {} is not after ride start {}",
                self.end_time, closed.start_ts
            )));
        }
        // Telemetry may have moved the vehicle during the ride; the end row
        // must still become its last known location.
        if let Some(last) = tx.last_location(closed.vehicle_id).await? {
            if self.end_time <= last.ts {
                return Err(FleetError::Validation(format!(
                    "end time {} is not after last known location at {}",
                    self.end_time, last.ts
                )));
            }
        }

        let end = LocationHistory::new(
            closed.vehicle_id,
            self.end_time,
            self.latitude,
            self.longitude,
        );
        tx.insert_location(&end).await?;

        if !tx.release_vehicle(closed.vehicle_id, self.battery).await? {
            return Err(FleetError::Conflict(format!(
                "vehicle {} was not in use when ride {} ended",
                closed.vehicle_id, self.ride_id
            )));
        }

        Ok(closed.vehicle_id)
    }
}

struct RidesByUser {
    user_email: String,
}

#[async_trait]
impl UnitOfWork for RidesByUser {
    type Output = Vec<RideSummary>;

    fn name(&self) -> &'static str {
        "rides_by_user"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<Vec<RideSummary>> {
        Ok(tx.rides_by_user(&self.user_email).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::telemetry::LocationPing;
    use crate::models::{NewVehicle, VehicleInfo};
    use crate::store::{Datastore, IsolationLevel, MemoryDatastore};
    use crate::txn::RetryPolicy;
    use crate::fleet::VehicleRegistry;
    use std::sync::Arc;

    async fn setup() -> (MemoryDatastore, RideLifecycle, VehicleRegistry, Uuid) {
        let store = MemoryDatastore::new();
        let executor = TransactionExecutor::new(Arc::new(store.clone()), RetryPolicy::default());
        let vehicles = VehicleRegistry::new(executor.clone());
        let (vehicle_id, _) = vehicles
            .add_vehicle(&NewVehicle {
                vehicle_info: VehicleInfo::default(),
                battery: 80,
                latitude: 40.0,
                longitude: -74.0,
            })
            .await
            .unwrap();
        (store, RideLifecycle::new(executor), vehicles, vehicle_id)
    }

    #[tokio::test]
    async fn test_start_ride_requires_location_history() {
        let (_, rides, _, _) = setup().await;
        let err = rides.start_ride(Uuid::new_v4(), "a@x.com").await.unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_second_start_is_a_conflict() {
        let (_, rides, _, vehicle_id) = setup().await;
        rides.start_ride(vehicle_id, "a@x.com").await.unwrap();
        let err = rides.start_ride(vehicle_id, "b@x.com").await.unwrap_err();
        assert!(matches!(err, FleetError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_active_ride_hidden_from_other_users() {
        let (_, rides, _, vehicle_id) = setup().await;
        let ride = rides.start_ride(vehicle_id, "a@x.com").await.unwrap();

        let active = rides.get_active_ride(vehicle_id, "a@x.com").await.unwrap();
        assert_eq!(active.ride_id, ride.id);
        assert_eq!(active.vehicle.last_checkin, ride.start_ts);
        assert!(active.vehicle.in_use);

        let err = rides
            .get_active_ride(vehicle_id, "b@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_end_before_start_is_rejected_atomically() {
        let (store, rides, _, vehicle_id) = setup().await;
        let ride = rides.start_ride(vehicle_id, "a@x.com").await.unwrap();

        let err = rides
            .end_ride(ride.id, 41.0, -75.0, 50, ride.start_ts - Duration::seconds(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));

        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        let stored = tx.fetch_ride(ride.id).await.unwrap().unwrap();
        assert!(stored.is_active());
    }

    #[tokio::test]
    async fn test_end_must_follow_telemetry_recorded_during_the_ride() {
        let (store, rides, vehicles, vehicle_id) = setup().await;
        let ride = rides.start_ride(vehicle_id, "a@x.com").await.unwrap();
        let ping = LocationPing {
            vehicle_id,
            ts: ride.start_ts + Duration::seconds(30),
            latitude: 1.0,
            longitude: 1.0,
        };
        assert!(vehicles.record_location(&ping).await.unwrap());

        for end_time in [ping.ts, ride.start_ts + Duration::seconds(10)] {
            let err = rides
                .end_ride(ride.id, 42.0, -76.0, 50, end_time)
                .await
                .unwrap_err();
            assert!(matches!(err, FleetError::Validation(_)));
        }

        // rejected ends wrote nothing and left the ride open
        let mut tx = store.begin(IsolationLevel::Serializable).await.unwrap();
        assert!(tx.fetch_ride(ride.id).await.unwrap().unwrap().is_active());
        assert_eq!(tx.location_history(vehicle_id, 10).await.unwrap().len(), 3);
        tx.rollback().await.unwrap();

        let end_time = ping.ts + Duration::seconds(1);
        rides
            .end_ride(ride.id, 42.0, -76.0, 50, end_time)
            .await
            .unwrap();
        let listed = vehicles.get_vehicles(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].last_checkin, end_time);
        assert_eq!((listed[0].last_latitude, listed[0].last_longitude), (42.0, -76.0));
    }

    #[tokio::test]
    async fn test_end_ride_validates_input_before_touching_the_store() {
        let (_, rides, _, _) = setup().await;
        let err = rides
            .end_ride(Uuid::new_v4(), 120.0, 0.0, 50, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Validation(_)));

        let err = rides
            .end_ride(Uuid::new_v4(), 0.0, 0.0, 50, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rides_by_user_most_recent_first() {
        let (_, rides, _, vehicle_id) = setup().await;
        let first = rides.start_ride(vehicle_id, "a@x.com").await.unwrap();
        rides
            .end_ride(first.id, 40.5, -74.5, 70, first.start_ts + Duration::minutes(5))
            .await
            .unwrap();
        let second = rides.start_ride(vehicle_id, "a@x.com").await.unwrap();

        let history = rides.get_rides_by_user("a@x.com").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].ride_id, second.id);
        assert_eq!(history[1].ride_id, first.id);
        assert!(history[0].end_ts.is_none());
        assert!(history[1].end_ts.is_some());
        assert!(rides.get_rides_by_user("b@x.com").await.unwrap().is_empty());
    }
}
