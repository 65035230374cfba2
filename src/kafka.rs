use crate::config::KafkaConfig;
use crate::fleet::VehicleRegistry;
use crate::processor::{process_message, ProcessOutcome};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consumes vehicle telemetry with SASL auth and a circuit breaker on broker errors.
pub async fn start_kafka_consumer(
    config: &KafkaConfig,
    vehicles: VehicleRegistry,
) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.topic);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("group.id", &config.group_id)
        .set("auto.offset.reset", &config.auto_offset_reset)
        .set("security.protocol", &config.security_protocol)
        .set("sasl.mechanism", &config.sasl_mechanism)
        .set("sasl.username", &config.username)
        .set("sasl.password", &config.password);

    let consumer: StreamConsumer = client_config.create()?;

    consumer.subscribe(&[&config.topic])?;
    info!("Subscribed to topic: {}", config.topic);

    let mut consecutive_failures = 0;
    let max_retries = config.max_retries;
    let cooldown_duration = Duration::from_secs(config.circuit_breaker_cooldown);

    loop {
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        match consumer.recv().await {
            Ok(m) => {
                consecutive_failures = 0;

                let Some(payload) = m.payload() else {
                    warn!("Received empty payload from Kafka");
                    continue;
                };

                let vehicles = vehicles.clone();
                let payload = payload.to_vec();

                // each ping is its own transaction; don't hold up the consumer
                tokio::spawn(async move {
                    match process_message(&vehicles, &payload).await {
                        Ok(ProcessOutcome::Recorded) => {}
                        Ok(outcome) => debug!("Telemetry message not recorded: {:?}", outcome),
                        Err(e) => error!("Error processing message: {}", e),
                    }
                });
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Kafka error: {}. Failure count {} / {}",
                    e, consecutive_failures, max_retries
                );
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}
