use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Position ping published by a vehicle's tracker.
#[derive(Debug, Deserialize)]
pub struct TelemetryMessage {
    pub data: TelemetryData,
    #[serde(default)]
    pub metadata: Metadata,
    pub uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelemetryData {
    #[serde(rename = "VEHICLE_ID")]
    pub vehicle_id: Option<String>,
    #[serde(rename = "GPS_DATETIME")]
    pub gps_datetime: Option<String>,
    #[serde(rename = "LATITUDE", default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "LONGITUDE", default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(rename = "VEHICLE_ID")]
    pub vehicle_id: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

/// A telemetry message reduced to what LocationHistory stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationPing {
    pub vehicle_id: Uuid,
    pub ts: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl TelemetryMessage {
    pub fn get_vehicle_id(&self) -> Option<&String> {
        self.data
            .vehicle_id
            .as_ref()
            .or(self.metadata.vehicle_id.as_ref())
    }

    /// GPS time in UTC. Trackers send either a space or a `T` separator, or RFC 3339.
    pub fn gps_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.data.gps_datetime.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parsing_tracker_payload() {
        let payload = r#"
        {
            "data": {
                "VEHICLE_ID": "aaaaaaaa-8e7a-4bd6-9c5b-4d0a0c1f7a11",
                "GPS_DATETIME": "2025-11-29 06:15:15",
                "LATITUDE": "+40.712800",
                "LONGITUDE": "-74.006000",
                "BATTERY": "87",
                "SATELLITES": "9"
            },
            "metadata": {
                "CLIENT_IP": "44.204.32.23",
                "WORKER_ID": 3
            },
            "uuid": "d52b1454-d43d-50fa-99ca-79515c904162"
        }
        "#;

        let msg: TelemetryMessage = serde_json::from_str(payload).unwrap();
        assert_eq!(msg.data.latitude, Some(40.7128));
        assert_eq!(msg.data.longitude, Some(-74.006));
        assert_eq!(
            msg.get_vehicle_id().map(String::as_str),
            Some("aaaaaaaa-8e7a-4bd6-9c5b-4d0a0c1f7a11")
        );
        let ts = msg.gps_timestamp().unwrap();
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (6, 15, 15));
    }

    #[test]
    fn test_vehicle_id_falls_back_to_metadata() {
        let payload = r#"{
            "data": { "GPS_DATETIME": "2025-11-29T06:15:15", "LATITUDE": 1.5, "LONGITUDE": "" },
            "metadata": { "VEHICLE_ID": "from-metadata" }
        }"#;

        let msg: TelemetryMessage = serde_json::from_str(payload).unwrap();
        assert_eq!(msg.get_vehicle_id().map(String::as_str), Some("from-metadata"));
        assert_eq!(msg.data.latitude, Some(1.5));
        assert_eq!(msg.data.longitude, None);
        assert!(msg.gps_timestamp().is_some());
    }
}
