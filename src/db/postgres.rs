use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{queries, DbPool};
use crate::error::StoreError;
use crate::models::{
    ActiveRide, ClosedRide, LocationHistory, Ride, RideSummary, User, Vehicle, VehicleInfo,
    VehicleWithLocation,
};
use crate::store::{Datastore, FleetTransaction, IsolationLevel};

/// Gateway over a bounded sqlx pool. One pooled connection per transaction.
#[derive(Clone)]
pub struct PgDatastore {
    pool: DbPool,
}

impl PgDatastore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Box<dyn FleetTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let set_isolation = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        sqlx::query(&set_isolation).execute(&mut *tx).await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Rolled back by sqlx if dropped before `commit`.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FleetTransaction for PgTransaction {
    async fn insert_vehicle(
        &mut self,
        id: Uuid,
        battery: i32,
        vehicle_info: &VehicleInfo,
    ) -> Result<Vehicle, StoreError> {
        let vehicle = sqlx::query_as::<_, Vehicle>(queries::INSERT_VEHICLE)
            .bind(id)
            .bind(battery)
            .bind(Json(vehicle_info.clone()))
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(vehicle)
    }

    async fn fetch_vehicle(&mut self, id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        let vehicle = sqlx::query_as::<_, Vehicle>(queries::SELECT_VEHICLE)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(vehicle)
    }

    async fn fetch_vehicles_with_last_location(
        &mut self,
        limit: i64,
    ) -> Result<Vec<VehicleWithLocation>, StoreError> {
        let rows =
            sqlx::query_as::<_, VehicleWithLocation>(queries::SELECT_VEHICLES_WITH_LAST_LOCATION)
                .bind(limit)
                .fetch_all(&mut *self.tx)
                .await?;
        Ok(rows)
    }

    async fn claim_vehicle(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::CLAIM_VEHICLE)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_vehicle(&mut self, id: Uuid, battery: i32) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::RELEASE_VEHICLE)
            .bind(id)
            .bind(battery)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_idle_vehicle(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::DELETE_IDLE_VEHICLE)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn last_location(
        &mut self,
        vehicle_id: Uuid,
    ) -> Result<Option<LocationHistory>, StoreError> {
        let row = sqlx::query_as::<_, LocationHistory>(queries::SELECT_LAST_LOCATION)
            .bind(vehicle_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn insert_location(&mut self, location: &LocationHistory) -> Result<(), StoreError> {
        sqlx::query(queries::INSERT_LOCATION)
            .bind(location.id)
            .bind(location.vehicle_id)
            .bind(location.ts)
            .bind(location.latitude)
            .bind(location.longitude)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn location_history(
        &mut self,
        vehicle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LocationHistory>, StoreError> {
        let rows = sqlx::query_as::<_, LocationHistory>(queries::SELECT_LOCATION_HISTORY)
            .bind(vehicle_id)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn insert_ride(&mut self, ride: &Ride) -> Result<(), StoreError> {
        sqlx::query(queries::INSERT_RIDE)
            .bind(ride.id)
            .bind(ride.vehicle_id)
            .bind(&ride.user_email)
            .bind(ride.start_ts)
            .bind(ride.end_ts)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn fetch_ride(&mut self, id: Uuid) -> Result<Option<Ride>, StoreError> {
        let ride = sqlx::query_as::<_, Ride>(queries::SELECT_RIDE)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(ride)
    }

    async fn open_ride_for_vehicle(
        &mut self,
        vehicle_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        let ride_id = sqlx::query_scalar::<_, Uuid>(queries::SELECT_OPEN_RIDE_FOR_VEHICLE)
            .bind(vehicle_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(ride_id)
    }

    async fn close_ride(
        &mut self,
        id: Uuid,
        end_ts: DateTime<Utc>,
    ) -> Result<Option<ClosedRide>, StoreError> {
        let closed = sqlx::query_as::<_, ClosedRide>(queries::CLOSE_RIDE)
            .bind(id)
            .bind(end_ts)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(closed)
    }

    async fn active_ride(
        &mut self,
        vehicle_id: Uuid,
        user_email: &str,
    ) -> Result<Option<ActiveRide>, StoreError> {
        let row = sqlx::query(queries::SELECT_ACTIVE_RIDE)
            .bind(vehicle_id)
            .bind(user_email)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(ActiveRide {
                ride_id: row.try_get("ride_id")?,
                vehicle: VehicleWithLocation::from_row(&row)?,
            })),
            None => Ok(None),
        }
    }

    async fn rides_by_user(&mut self, user_email: &str) -> Result<Vec<RideSummary>, StoreError> {
        let rows = sqlx::query_as::<_, RideSummary>(queries::SELECT_RIDES_BY_USER)
            .bind(user_email)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(queries::INSERT_USER)
            .bind(&user.email)
            .bind(&user.last_name)
            .bind(&user.first_name)
            .bind(&user.phone_numbers)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn fetch_user(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(queries::SELECT_USER)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn delete_user(&mut self, email: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::DELETE_USER)
            .bind(email)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
