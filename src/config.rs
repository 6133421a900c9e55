use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_RETENTION_YEARS: u32 = 2;

/// Expired-stock retention configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Batches whose expiry date falls before January 1 of
    /// (current year − years) are eligible for purging.
    #[serde(default = "default_retention_years")]
    #[validate(range(min = 1, max = 50))]
    pub years: u32,

    /// When set, cleanup invocations report what they would purge without
    /// mutating anything.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            years: default_retention_years(),
            dry_run: false,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Expired-stock retention settings
    #[serde(default)]
    #[validate]
    pub retention: RetentionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            retention: RetentionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `config/default.toml`, the per-environment
    /// file, and `RXSTOCK_`-prefixed environment variables, in that order of
    /// precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            env::var("RXSTOCK_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(Environment::with_prefix("RXSTOCK").separator("__"))
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()
            .map_err(|err| ConfigError::Message(err.to_string()))?;
        Ok(app)
    }
}

fn default_retention_years() -> u32 {
    DEFAULT_RETENTION_YEARS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
