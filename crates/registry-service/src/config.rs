//! Registry service configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL is
//! redacted in Debug output.

use common::config::{ObservabilityConfig, RedisEndpoint};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Default interval between purge sweeps.
pub const DEFAULT_PURGE_INTERVAL_SECONDS: u64 = 60;

/// Default metrics endpoint bind address.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:9090";

/// Prefix for service-specific environment variables.
const ENV_PREFIX: &str = "REGISTRY";

/// Registry service configuration.
#[derive(Clone)]
pub struct Config {
    /// Redis connection URL. Taken from `REDIS_URL`, or built from
    /// `REDIS_HOST`/`REDIS_PORT` when unset.
    pub redis_url: SecretString,

    /// Interval between purge sweeps (default: 60).
    pub purge_interval_seconds: u64,

    /// Registry keys purged by the background sweeper. Empty disables it.
    pub purge_keys: Vec<String>,

    /// Prometheus endpoint bind address (default: "0.0.0.0:9090").
    pub metrics_bind_address: SocketAddr,

    /// Log filter and format.
    pub observability: ObservabilityConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("purge_interval_seconds", &self.purge_interval_seconds)
            .field("purge_keys", &self.purge_keys)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("observability", &self.observability)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .filter(|url| !url.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| RedisEndpoint::from_vars(vars).url()),
        );

        let purge_interval_seconds = match vars.get("REGISTRY_PURGE_INTERVAL_SECONDS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::InvalidValue(format!(
                        "REGISTRY_PURGE_INTERVAL_SECONDS must be a positive integer, got {raw:?}"
                    )))
                }
                Ok(seconds) => seconds,
            },
            None => DEFAULT_PURGE_INTERVAL_SECONDS,
        };

        let purge_keys: Vec<String> = vars
            .get("REGISTRY_PURGE_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let metrics_bind_address = vars
            .get("REGISTRY_METRICS_BIND_ADDRESS")
            .map_or(DEFAULT_METRICS_BIND_ADDRESS, String::as_str)
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::InvalidValue(format!("REGISTRY_METRICS_BIND_ADDRESS: {e}"))
            })?;

        Ok(Config {
            redis_url,
            purge_interval_seconds,
            purge_keys,
            metrics_bind_address,
            observability: ObservabilityConfig::from_vars(ENV_PREFIX, vars),
        })
    }
}
