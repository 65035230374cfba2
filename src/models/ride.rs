use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::vehicle::{VehicleInfo, VehicleWithLocation};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub user_email: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>, // NULL while the ride is active
}

impl Ride {
    pub fn is_active(&self) -> bool {
        self.end_ts.is_none()
    }
}

/// Result of closing a ride: what EndRide needs to finish the transition.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct ClosedRide {
    pub vehicle_id: Uuid,
    pub start_ts: DateTime<Utc>,
}

/// An open ride together with the vehicle as it was when the ride started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRide {
    pub ride_id: Uuid,
    pub vehicle: VehicleWithLocation,
}

/// One row of a user's ride history.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RideSummary {
    pub ride_id: Uuid,
    pub vehicle_id: Uuid,
    pub vehicle_info: Json<VehicleInfo>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
    pub in_use: bool,
}
