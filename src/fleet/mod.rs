//! Fleet operations exposed to the HTTP layer. Each public call validates
//! its input, then runs one unit of work through the executor.

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::error::{FleetError, FleetResult};

pub mod rides;
pub mod users;
pub mod vehicles;

pub use rides::RideLifecycle;
pub use users::UserRegistry;
pub use vehicles::{RegistryLimits, VehicleRegistry};

/// Parses an identifier taken from a request path or body.
pub fn parse_id(raw: &str, what: &str) -> FleetResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| FleetError::Validation(format!("invalid {} id '{}': {}", what, raw, e)))
}

/// Current time at the store's precision (microseconds), so values read
/// back compare equal to the ones written.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn validate_coordinates(latitude: f64, longitude: f64) -> FleetResult<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(FleetError::Validation(format!(
            "latitude {} is outside [-90, 90]",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(FleetError::Validation(format!(
            "longitude {} is outside [-180, 180]",
            longitude
        )));
    }
    Ok(())
}

pub(crate) fn validate_battery(battery: i32) -> FleetResult<()> {
    if !(0..=100).contains(&battery) {
        return Err(FleetError::Validation(format!(
            "battery {} is outside [0, 100]",
            battery
        )));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> FleetResult<()> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(FleetError::Validation(format!(
            "'{}' is not an email address",
            email
        )));
    }
    Ok(())
}

pub(crate) fn validate_limit(limit: i64) -> FleetResult<()> {
    if limit < 1 {
        return Err(FleetError::Validation(format!(
            "limit must be at least 1, got {}",
            limit
        )));
    }
    Ok(())
}
