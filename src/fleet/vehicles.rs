use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{validate_battery, validate_coordinates, validate_limit};
use crate::error::{FleetError, FleetResult};
use crate::models::telemetry::LocationPing;
use crate::models::{LocationHistory, NewVehicle, Vehicle, VehicleWithLocation};
use crate::store::FleetTransaction;
use crate::txn::{TransactionExecutor, UnitOfWork};

/// Listing sizes used when the caller does not ask for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    pub max_vehicles: i64,
    pub max_locations: i64,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_vehicles: 20,
            max_locations: 10,
        }
    }
}

#[derive(Clone)]
pub struct VehicleRegistry {
    executor: TransactionExecutor,
    limits: RegistryLimits,
}

impl VehicleRegistry {
    pub fn new(executor: TransactionExecutor) -> Self {
        Self::with_limits(executor, RegistryLimits::default())
    }

    pub fn with_limits(executor: TransactionExecutor, limits: RegistryLimits) -> Self {
        Self { executor, limits }
    }

    /// Inserts the vehicle and its first location together. Returns
    /// `(vehicle_id, location_id)`.
    pub async fn add_vehicle(&self, new: &NewVehicle) -> FleetResult<(Uuid, Uuid)> {
        validate_battery(new.battery)?;
        validate_coordinates(new.latitude, new.longitude)?;

        let work = AddVehicle {
            vehicle: new.clone(),
            vehicle_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
        };
        let ids = self.executor.run(&work).await?;
        info!("Added vehicle {}", ids.0);
        Ok(ids)
    }

    pub async fn get_vehicle(&self, id: Uuid) -> FleetResult<Vehicle> {
        self.executor.run(&GetVehicle { id }).await
    }

    /// Vehicles with their last known position, most recently seen first.
    pub async fn get_vehicles(&self, limit: Option<i64>) -> FleetResult<Vec<VehicleWithLocation>> {
        let limit = limit.unwrap_or(self.limits.max_vehicles);
        validate_limit(limit)?;
        self.executor.run(&ListVehicles { limit }).await
    }

    pub async fn get_vehicle_and_location_history(
        &self,
        id: Uuid,
        limit: Option<i64>,
    ) -> FleetResult<(Vehicle, Vec<LocationHistory>)> {
        let limit = limit.unwrap_or(self.limits.max_locations);
        validate_limit(limit)?;
        self.executor.run(&VehicleHistory { id, limit }).await
    }

    /// Refuses with `ConstraintViolation` while the vehicle is being ridden.
    pub async fn delete_vehicle(&self, id: Uuid) -> FleetResult<()> {
        self.executor.run(&DeleteVehicle { id }).await?;
        info!("Deleted vehicle {}", id);
        Ok(())
    }

    /// Appends a telemetry position. Returns false when the ping is not
    /// newer than the vehicle's last known location and was skipped.
    pub async fn record_location(&self, ping: &LocationPing) -> FleetResult<bool> {
        validate_coordinates(ping.latitude, ping.longitude)?;
        let recorded = self
            .executor
            .run(&RecordLocation {
                location: LocationHistory::new(
                    ping.vehicle_id,
                    ping.ts,
                    ping.latitude,
                    ping.longitude,
                ),
            })
            .await?;
        if recorded {
            debug!("Recorded location for vehicle {} at {}", ping.vehicle_id, ping.ts);
        }
        Ok(recorded)
    }
}

struct AddVehicle {
    vehicle: NewVehicle,
    vehicle_id: Uuid,
    location_id: Uuid,
}

#[async_trait]
impl UnitOfWork for AddVehicle {
    type Output = (Uuid, Uuid);

    fn name(&self) -> &'static str {
        "add_vehicle"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<(Uuid, Uuid)> {
        tx.insert_vehicle(
            self.vehicle_id,
            self.vehicle.battery,
            &self.vehicle.vehicle_info,
        )
        .await?;

        let location = LocationHistory {
            id: self.location_id,
            vehicle_id: self.vehicle_id,
            ts: super::now(),
            latitude: self.vehicle.latitude,
            longitude: self.vehicle.longitude,
        };
        tx.insert_location(&location).await?;

        Ok((self.vehicle_id, self.location_id))
    }
}

struct GetVehicle {
    id: Uuid,
}

#[async_trait]
impl UnitOfWork for GetVehicle {
    type Output = Vehicle;

    fn name(&self) -> &'static str {
        "get_vehicle"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<Vehicle> {
        tx.fetch_vehicle(self.id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("vehicle {}", self.id)))
    }
}

struct ListVehicles {
    limit: i64,
}

#[async_trait]
impl UnitOfWork for ListVehicles {
    type Output = Vec<VehicleWithLocation>;

    fn name(&self) -> &'static str {
        "get_vehicles"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<Vec<VehicleWithLocation>> {
        Ok(tx.fetch_vehicles_with_last_location(self.limit).await?)
    }
}

struct VehicleHistory {
    id: Uuid,
    limit: i64,
}

#[async_trait]
impl UnitOfWork for VehicleHistory {
    type Output = (Vehicle, Vec<LocationHistory>);

    fn name(&self) -> &'static str {
        "get_vehicle_and_location_history"
    }

    async fn run(
        &self,
        tx: &mut dyn FleetTransaction,
    ) -> FleetResult<(Vehicle, Vec<LocationHistory>)> {
        let vehicle = tx
            .fetch_vehicle(self.id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("vehicle {}", self.id)))?;
        let history = tx.location_history(self.id, self.limit).await?;
        Ok((vehicle, history))
    }
}

struct DeleteVehicle {
    id: Uuid,
}

#[async_trait]
impl UnitOfWork for DeleteVehicle {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete_vehicle"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<()> {
        if tx.delete_idle_vehicle(self.id).await? {
            return Ok(());
        }
        // zero rows: tell "in use" apart from "missing"
        match tx.fetch_vehicle(self.id).await? {
            Some(_) => Err(FleetError::ConstraintViolation(format!(
                "vehicle {} is in use and cannot be deleted",
                self.id
            ))),
            None => Err(FleetError::NotFound(format!("vehicle {}", self.id))),
        }
    }
}

struct RecordLocation {
    location: LocationHistory,
}

#[async_trait]
impl UnitOfWork for RecordLocation {
    type Output = bool;

    fn name(&self) -> &'static str {
        "record_location"
    }

    async fn run(&self, tx: &mut dyn FleetTransaction) -> FleetResult<bool> {
        let vehicle_id = self.location.vehicle_id;
        if tx.fetch_vehicle(vehicle_id).await?.is_none() {
            return Err(FleetError::NotFound(format!("vehicle {}", vehicle_id)));
        }
        if let Some(last) = tx.last_location(vehicle_id).await? {
            if self.location.ts <= last.ts {
                return Ok(false);
            }
        }
        tx.insert_location(&self.location).await?;
        Ok(true)
    }
}
