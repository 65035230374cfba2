use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::fleet::RegistryLimits;
use crate::txn::RetryPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_ms: u64,
    pub txn_max_retries: u32,
    pub txn_base_delay_ms: u64,
    pub txn_max_delay_ms: u64,
    pub max_vehicles: i64,
    pub max_locations: i64,
    pub log_level: String,
    #[cfg(feature = "kafka")]
    pub kafka: KafkaConfig,
}

#[cfg(feature = "kafka")]
#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub sasl_mechanism: String,
    pub username: String,
    pub password: String,
    pub security_protocol: String,
    pub max_retries: u32,
    pub circuit_breaker_cooldown: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
                let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
                let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "fleet".to_string());
                let db_user = env::var("DB_USER").unwrap_or_else(|_| "fleet".to_string());
                let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "fleet".to_string());
                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    db_user, db_pwd, db_host, db_port, db_name
                )
            }
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 20),
            db_acquire_timeout_ms: env_or("DB_ACQUIRE_TIMEOUT_MS", 5000),
            txn_max_retries: env_or("TXN_MAX_RETRIES", 8),
            txn_base_delay_ms: env_or("TXN_BASE_DELAY_MS", 10),
            txn_max_delay_ms: env_or("TXN_MAX_DELAY_MS", 1000),
            max_vehicles: env_or("MAX_VEHICLES", 20),
            max_locations: env_or("MAX_LOCATIONS", 10),
            log_level,
            #[cfg(feature = "kafka")]
            kafka: KafkaConfig::load(),
        })
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.db_acquire_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.txn_max_retries)
            .with_base_delay(Duration::from_millis(self.txn_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.txn_max_delay_ms))
    }

    pub fn registry_limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_vehicles: self.max_vehicles.max(1),
            max_locations: self.max_locations.max(1),
        }
    }
}

#[cfg(feature = "kafka")]
impl KafkaConfig {
    fn load() -> Self {
        Self {
            bootstrap_servers: env::var("KAFKA_BOOTSTRAP_SERVERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            topic: env::var("KAFKA_TOPIC").unwrap_or_else(|_| "vehicle-telemetry".to_string()),
            group_id: env::var("KAFKA_GROUP_ID")
                .unwrap_or_else(|_| "fleet-rides-consumer".to_string()),
            auto_offset_reset: env::var("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or_else(|_| "latest".to_string()),
            sasl_mechanism: env::var("KAFKA_SASL_MECHANISM")
                .unwrap_or_else(|_| "SCRAM-SHA-256".to_string()),
            username: env::var("KAFKA_USERNAME").unwrap_or_default(),
            password: env::var("KAFKA_PASSWORD").unwrap_or_default(),
            security_protocol: env::var("KAFKA_SECURITY_PROTOCOL")
                .unwrap_or_else(|_| "SASL_PLAINTEXT".to_string()),
            max_retries: env_or("KAFKA_MAX_RETRIES", 5),
            circuit_breaker_cooldown: env_or("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(env::var(key).ok().as_deref(), default)
}

/// Missing or unparseable values fall back to `default`.
fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or::<u32>(Some(" 12 "), 8), 12);
        assert_eq!(parse_or::<u32>(Some("twelve"), 8), 8);
        assert_eq!(parse_or::<u32>(None, 8), 8);
        assert_eq!(parse_or::<i64>(Some("-1"), 20), -1);
    }

    #[test]
    fn test_derived_settings() {
        let config = AppConfig {
            database_url: "postgres://localhost/fleet".to_string(),
            db_max_connections: 20,
            db_acquire_timeout_ms: 250,
            txn_max_retries: 3,
            txn_base_delay_ms: 5,
            txn_max_delay_ms: 40,
            max_vehicles: 0,
            max_locations: 10,
            log_level: "info".to_string(),
            #[cfg(feature = "kafka")]
            kafka: KafkaConfig::load(),
        };

        assert_eq!(config.acquire_timeout(), Duration::from_millis(250));
        let retry = config.retry_policy();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.delay_for(1), Duration::from_millis(5));
        assert_eq!(retry.delay_for(10), Duration::from_millis(40));
        assert_eq!(config.registry_limits().max_vehicles, 1);
    }
}
