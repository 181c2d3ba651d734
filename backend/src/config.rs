//! Configuration management for the Farm Produce Distribution Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with FDP_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Reservation tuning
    pub reservation: ReservationConfig,

    /// Payment gateway configuration
    pub payment: PaymentConfig,

    /// Messaging gateway configuration (SMS/WhatsApp)
    pub messaging: MessagingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for validating JWT tokens issued by the auth provider
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    /// Default checkout hold duration in seconds
    pub default_ttl_secs: i64,

    /// How often the background expiry sweep runs
    pub sweep_interval_secs: u64,

    /// Bounded retries for a reserve call that loses a stock race
    pub max_reserve_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Payment gateway base URL
    pub base_url: String,

    /// API key for the payment gateway
    pub api_key: String,

    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessagingConfig {
    /// Messaging gateway base URL
    pub base_url: String,

    /// API token; leave empty to disable outbound notifications
    pub api_token: String,

    /// Sender identifier shown to customers
    pub sender_id: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FDP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("reservation.default_ttl_secs", 900)?
            .set_default("reservation.sweep_interval_secs", 60)?
            .set_default("reservation.max_reserve_attempts", 3)?
            .set_default("messaging.api_token", "")?
            .set_default("messaging.sender_id", "FarmDirect")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FDP_ prefix)
            .add_source(
                Environment::with_prefix("FDP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
