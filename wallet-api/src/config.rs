use config::{ConfigError, Environment, File};
use ledger_engine::{AccrualConfig, AccrualPeriod, EngineConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LedgerConfig {
    pub max_txn_retries: u32,
    pub accrual_period: String,
    pub accrual_chunk_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("gateway.base_url", "https://api.paystack.co")?
            .set_default("gateway.secret_key", "")?
            .set_default("gateway.timeout_secs", 30)?
            .set_default("ledger.max_txn_retries", 5)?
            .set_default("ledger.accrual_period", "daily")?
            .set_default("ledger.accrual_chunk_size", 50)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder
                .add_source(File::with_name(&format!("config/{}", environment)).required(false));
        }

        // Override with environment variables
        builder = builder.add_source(Environment::with_prefix("ZYPPAYX").separator("__"));

        // Special handling for common env vars
        if let Ok(secret_key) = env::var("PAYSTACK_SECRET_KEY") {
            builder = builder.set_override("gateway.secret_key", secret_key)?;
        }

        if let Ok(base_url) = env::var("PAYSTACK_BASE_URL") {
            builder = builder.set_override("gateway.base_url", base_url)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        // Validate configuration
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.gateway.secret_key.is_empty() {
            return Err("Gateway secret key is required".to_string());
        }

        if self.gateway.base_url.is_empty() {
            return Err("Gateway base URL is required".to_string());
        }

        if self.ledger.accrual_period.parse::<AccrualPeriod>().is_err() {
            return Err(format!(
                "Unknown accrual period: {}",
                self.ledger.accrual_period
            ));
        }

        if self.ledger.accrual_chunk_size == 0 {
            return Err("Accrual chunk size cannot be 0".to_string());
        }

        Ok(())
    }

    pub fn engine_config(&self) -> Result<EngineConfig, String> {
        let period = self.ledger.accrual_period.parse::<AccrualPeriod>()?;
        Ok(EngineConfig {
            retry: RetryConfig {
                max_retries: self.ledger.max_txn_retries,
                ..RetryConfig::default()
            },
            accrual: AccrualConfig {
                period,
                chunk_size: self.ledger.accrual_chunk_size,
            },
        })
    }

    pub fn gateway_config(&self) -> gateway_client::GatewayConfig {
        gateway_client::GatewayConfig {
            base_url: self.gateway.base_url.clone(),
            secret_key: self.gateway.secret_key.clone(),
            timeout_secs: self.gateway.timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: 4,
            },
            gateway: GatewayConfig {
                base_url: "https://api.paystack.co".to_string(),
                secret_key: "sk_test_abc".to_string(),
                timeout_secs: 30,
            },
            ledger: LedgerConfig {
                max_txn_retries: 5,
                accrual_period: "daily".to_string(),
                accrual_chunk_size: 50,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn missing_secret_key_is_rejected() {
        let mut config = base_config();
        config.gateway.secret_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_accrual_period_is_rejected() {
        let mut config = base_config();
        config.ledger.accrual_period = "weekly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_config_carries_ledger_settings() {
        let mut config = base_config();
        config.ledger.accrual_period = "hourly".to_string();
        config.ledger.accrual_chunk_size = 10;
        config.ledger.max_txn_retries = 3;

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.accrual.period, AccrualPeriod::Hourly);
        assert_eq!(engine.accrual.chunk_size, 10);
        assert_eq!(engine.retry.max_retries, 3);
    }
}
