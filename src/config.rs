//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Environment (development, production)
    pub environment: String,

    /// Seconds between integrity audit passes
    pub audit_interval_secs: u64,

    /// Accounts re-derived per audit pass
    pub audit_rederive_sample: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let audit_interval_secs = env::var("AUDIT_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("AUDIT_INTERVAL_SECS"))?;

        let audit_rederive_sample = env::var("AUDIT_REDERIVE_SAMPLE")
            .unwrap_or_else(|_| "16".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("AUDIT_REDERIVE_SAMPLE"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            environment,
            audit_interval_secs,
            audit_rederive_sample,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
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
