use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub mod postgres;
pub mod queries;
pub mod schema;

pub use postgres::PgDatastore;

pub type DbPool = Pool<Postgres>;

/// Bounded pool: callers wait at most `acquire_timeout` for a connection,
/// then fail with `StoreError::PoolExhausted`.
pub async fn init_pool(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}
