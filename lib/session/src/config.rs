//! Application configuration.
//!
//! Loaded via the `config` crate from an optional file and `SATU_`
//! environment variables. Nested keys use `__`, for example
//! `SATU_DELIVERY__CONCURRENCY=5`.

use satu_delivery::DeliveryConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SatuConfig {
    /// SQLite connection URL for the credential store.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Outbound delivery limits.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Reconnection policy.
    #[serde(default)]
    pub session: ReconnectConfig,
}

/// Reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Consecutive recoverable closes before the session credentials are
    /// discarded.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay before retrying after a failed connect, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_database_url() -> String {
    "sqlite://satu.sqlite3?mode=rwc".to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for SatuConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            delivery: DeliveryConfig::default(),
            session: ReconnectConfig::default(),
        }
    }
}

impl SatuConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an invalid value.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from `path`, if given, overridden by the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder
            .add_source(
                config::Environment::with_prefix("SATU")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
