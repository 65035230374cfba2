use sqlx::{Pool, Postgres};
use tracing::info;

use crate::error::StoreError;

/// Executed in order; each statement is idempotent.
pub const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS vehicles (
    id UUID PRIMARY KEY,
    in_use BOOLEAN NOT NULL DEFAULT false,
    battery INT4 NOT NULL,
    vehicle_info JSONB NOT NULL,
    serial_number BIGSERIAL NOT NULL
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS location_history (
    id UUID PRIMARY KEY,
    vehicle_id UUID NOT NULL REFERENCES vehicles (id) ON DELETE CASCADE,
    ts TIMESTAMPTZ NOT NULL,
    latitude FLOAT8 NOT NULL,
    longitude FLOAT8 NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS location_history_vehicle_ts_idx
    ON location_history (vehicle_id, ts DESC);
"#,
    r#"
CREATE TABLE IF NOT EXISTS rides (
    id UUID PRIMARY KEY,
    vehicle_id UUID NOT NULL REFERENCES vehicles (id) ON DELETE CASCADE,
    user_email TEXT NOT NULL,
    start_ts TIMESTAMPTZ NOT NULL,
    end_ts TIMESTAMPTZ
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS rides_user_start_idx ON rides (user_email, start_ts DESC);
"#,
    r#"
CREATE UNIQUE INDEX IF NOT EXISTS rides_one_open_per_vehicle_idx
    ON rides (vehicle_id) WHERE end_ts IS NULL;
"#,
    r#"
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    phone_numbers TEXT[] NOT NULL DEFAULT '{}'
);
"#,
];

pub async fn init_schema(pool: &Pool<Postgres>) -> Result<(), StoreError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
