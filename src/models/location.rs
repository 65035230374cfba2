use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only position record. The latest `ts` per vehicle is its last known location.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LocationHistory {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub ts: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationHistory {
    pub fn new(vehicle_id: Uuid, ts: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_id,
            ts,
            latitude,
            longitude,
        }
    }
}
