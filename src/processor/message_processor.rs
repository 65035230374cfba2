use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::FleetError;
use crate::fleet::VehicleRegistry;
use crate::models::telemetry::{LocationPing, TelemetryMessage};

/// What happened to one telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Appended to the vehicle's location history.
    Recorded,
    /// Not newer than the last known position.
    Stale,
    /// Malformed, or for a vehicle we do not know.
    Skipped,
}

/// Turns a raw telemetry payload into a location row.
///
/// Bad payloads are logged and skipped so one broken tracker cannot stall
/// the consumer. Only store failures are returned as errors.
pub async fn process_message(
    vehicles: &VehicleRegistry,
    payload: &[u8],
) -> anyhow::Result<ProcessOutcome> {
    let message: TelemetryMessage = match serde_json::from_slice(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return Ok(ProcessOutcome::Skipped);
        }
    };

    let Some(ping) = to_ping(&message) else {
        return Ok(ProcessOutcome::Skipped);
    };

    debug!(
        "Processing telemetry {:?} for vehicle {}",
        message.uuid, ping.vehicle_id
    );

    match vehicles.record_location(&ping).await {
        Ok(true) => Ok(ProcessOutcome::Recorded),
        Ok(false) => {
            debug!(
                "Ignored stale ping for vehicle {} at {}",
                ping.vehicle_id, ping.ts
            );
            Ok(ProcessOutcome::Stale)
        }
        Err(FleetError::NotFound(_)) => {
            warn!("Telemetry for unknown vehicle {}, skipping", ping.vehicle_id);
            Ok(ProcessOutcome::Skipped)
        }
        Err(FleetError::Validation(reason)) => {
            warn!("Invalid telemetry for vehicle {}: {}", ping.vehicle_id, reason);
            Ok(ProcessOutcome::Skipped)
        }
        Err(e) => Err(e.into()),
    }
}

fn to_ping(message: &TelemetryMessage) -> Option<LocationPing> {
    let Some(raw_id) = message.get_vehicle_id() else {
        warn!("Message missing vehicle id, skipping");
        return None;
    };
    let vehicle_id = match Uuid::parse_str(raw_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            warn!("Invalid vehicle id '{}', skipping", raw_id);
            return None;
        }
    };
    let Some(ts) = message.gps_timestamp() else {
        warn!(
            "Invalid GPS_DATETIME: '{}'",
            message.data.gps_datetime.as_deref().unwrap_or("")
        );
        return None;
    };
    let (Some(latitude), Some(longitude)) = (message.data.latitude, message.data.longitude) else {
        warn!("Message for vehicle {} has no position, skipping", vehicle_id);
        return None;
    };

    Some(LocationPing {
        vehicle_id,
        ts,
        latitude,
        longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewVehicle, VehicleInfo};
    use crate::store::MemoryDatastore;
    use crate::txn::{RetryPolicy, TransactionExecutor};
    use chrono::{Duration, SecondsFormat, Utc};
    use std::sync::Arc;

    async fn registry_with_vehicle() -> (VehicleRegistry, Uuid) {
        let store = Arc::new(MemoryDatastore::new());
        let registry =
            VehicleRegistry::new(TransactionExecutor::new(store, RetryPolicy::default()));
        let (id, _) = registry
            .add_vehicle(&NewVehicle {
                vehicle_info: VehicleInfo::default(),
                battery: 100,
                latitude: 19.43,
                longitude: -99.13,
            })
            .await
            .unwrap();
        (registry, id)
    }

    fn payload(vehicle_id: &str, gps_datetime: &str, lat: &str, lon: &str) -> Vec<u8> {
        serde_json::json!({
            "data": {
                "VEHICLE_ID": vehicle_id,
                "GPS_DATETIME": gps_datetime,
                "LATITUDE": lat,
                "LONGITUDE": lon,
            },
            "uuid": "d52b1454-d43d-50fa-99ca-79515c904162"
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_fresh_ping_is_recorded() {
        let (registry, id) = registry_with_vehicle().await;
        let ts = (Utc::now() + Duration::minutes(1)).to_rfc3339_opts(SecondsFormat::Secs, true);

        let outcome = process_message(&registry, &payload(&id.to_string(), &ts, "19.5", "-99.2"))
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Recorded);

        let (_, history) = registry
            .get_vehicle_and_location_history(id, None)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].latitude, 19.5);
    }

    #[tokio::test]
    async fn test_old_ping_is_stale() {
        let (registry, id) = registry_with_vehicle().await;
        let outcome = process_message(
            &registry,
            &payload(&id.to_string(), "2020-01-01 00:00:00", "19.5", "-99.2"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ProcessOutcome::Stale);
    }

    #[tokio::test]
    async fn test_bad_messages_are_skipped() {
        let (registry, id) = registry_with_vehicle().await;
        let id = id.to_string();
        let future = (Utc::now() + Duration::minutes(1)).to_rfc3339();

        let cases = vec![
            b"not json".to_vec(),
            payload("not-a-uuid", &future, "1", "1"),
            payload(&id, "yesterday", "1", "1"),
            payload(&id, &future, "", "1"),
            payload(&id, &future, "91", "1"),
            payload(&Uuid::new_v4().to_string(), &future, "1", "1"),
        ];
        for case in cases {
            assert_eq!(
                process_message(&registry, &case).await.unwrap(),
                ProcessOutcome::Skipped
            );
        }
    }
}
