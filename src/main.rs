use fleet_rides::config::AppConfig;
use fleet_rides::db::{self, PgDatastore};
use fleet_rides::{TransactionExecutor, VehicleRegistry};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Fleet Rides Service...");

    let pool = db::init_pool(
        &config.database_url,
        config.db_max_connections,
        config.acquire_timeout(),
    )
    .await?;
    info!("Connected to database");

    db::schema::init_schema(&pool).await?;

    let store = Arc::new(PgDatastore::new(pool));
    let executor = TransactionExecutor::new(store, config.retry_policy());
    let vehicles = VehicleRegistry::with_limits(executor, config.registry_limits());

    run(&config, vehicles).await
}

#[cfg(feature = "kafka")]
async fn run(config: &AppConfig, vehicles: VehicleRegistry) -> anyhow::Result<()> {
    fleet_rides::kafka::start_kafka_consumer(&config.kafka, vehicles).await
}

#[cfg(not(feature = "kafka"))]
async fn run(_config: &AppConfig, _vehicles: VehicleRegistry) -> anyhow::Result<()> {
    info!("Built without the kafka feature; telemetry ingestion disabled. Exiting.");
    Ok(())
}
