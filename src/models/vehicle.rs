use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub in_use: bool,
    pub battery: i32,
    pub vehicle_info: Json<VehicleInfo>,
    pub serial_number: i64, // bigserial
}

/// Descriptive blob stored as JSONB; never inspected by the ride logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleInfo {
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub color: String,
    pub wear: String,
    pub purchase_information: PurchaseInformation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInformation {
    pub manufacturer: String,
    pub purchase_date: String,
    pub serial_number: String,
}

/// A vehicle joined to one of its location rows: the most recent one for
/// listings, the ride's start snapshot for active rides.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct VehicleWithLocation {
    #[sqlx(rename = "id")]
    #[serde(rename = "id")]
    pub vehicle_id: Uuid,
    pub in_use: bool,
    pub battery: i32,
    pub vehicle_info: Json<VehicleInfo>,
    pub last_checkin: DateTime<Utc>,
    pub last_latitude: f64,
    pub last_longitude: f64,
}

/// Input for `VehicleRegistry::add_vehicle`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewVehicle {
    pub vehicle_info: VehicleInfo,
    pub battery: i32,
    pub latitude: f64,
    pub longitude: f64,
}
