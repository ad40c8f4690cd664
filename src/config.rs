//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::exchange::{CurrencyConverterProvider, ExchangeRateApiProvider};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub exchange: ExchangeConfig,
}

/// Rate provider endpoints and the mock resolver's simulated latency
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub primary_url: String,
    pub primary_api_key: String,
    pub fallback_url: String,
    pub fallback_api_key: String,
    /// Upper bound on a single provider call
    pub timeout: Duration,
    pub mock_latency: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_or("PORT", 3000)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let exchange = ExchangeConfig::from_env()?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            exchange,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl ExchangeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let primary_url = env::var("EXCHANGE_PRIMARY_URL")
            .unwrap_or_else(|_| ExchangeRateApiProvider::DEFAULT_BASE_URL.to_string());
        let primary_api_key = env::var("EXCHANGE_PRIMARY_API_KEY").unwrap_or_default();

        let fallback_url = env::var("EXCHANGE_FALLBACK_URL")
            .unwrap_or_else(|_| CurrencyConverterProvider::DEFAULT_BASE_URL.to_string());
        let fallback_api_key = env::var("EXCHANGE_FALLBACK_API_KEY").unwrap_or_default();

        let timeout_ms: u64 = parse_or("EXCHANGE_TIMEOUT_MS", 5000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("EXCHANGE_TIMEOUT_MS"));
        }
        let mock_latency_ms: u64 = parse_or("MOCK_EXCHANGE_LATENCY_MS", 0)?;

        Ok(Self {
            primary_url,
            primary_api_key,
            fallback_url,
            fallback_api_key,
            timeout: Duration::from_millis(timeout_ms),
            mock_latency: Duration::from_millis(mock_latency_ms),
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Variables unique to this test so parallel tests don't race on them
    #[test]
    fn test_parse_or_default_and_invalid() {
        env::remove_var("FX_TRANSFER_TEST_UNSET");
        assert_eq!(parse_or("FX_TRANSFER_TEST_UNSET", 42u16).unwrap(), 42);

        env::set_var("FX_TRANSFER_TEST_PORT", " 8080 ");
        assert_eq!(parse_or("FX_TRANSFER_TEST_PORT", 3000u16).unwrap(), 8080);

        env::set_var("FX_TRANSFER_TEST_BAD", "eighty");
        assert!(matches!(
            parse_or("FX_TRANSFER_TEST_BAD", 3000u16),
            Err(ConfigError::InvalidValue("FX_TRANSFER_TEST_BAD"))
        ));
    }
}
