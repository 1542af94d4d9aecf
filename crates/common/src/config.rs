//! Shared configuration types for Tally components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default Redis host when no URL is configured.
pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";

/// Default Redis port when no URL is configured.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default log filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Redis endpoint given as separate host and port.
///
/// Used when a full `REDIS_URL` is not supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisEndpoint {
    /// Hostname or IP address of the Redis server
    pub host: String,
    /// TCP port of the Redis server
    pub port: u16,
}

impl Default for RedisEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.to_string(),
            port: DEFAULT_REDIS_PORT,
        }
    }
}

impl RedisEndpoint {
    /// Read `REDIS_HOST` and `REDIS_PORT`, falling back to defaults.
    ///
    /// An unparseable port falls back to the default port.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let host = vars
            .get("REDIS_HOST")
            .filter(|h| !h.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string());

        let port = vars
            .get("REDIS_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_REDIS_PORT);

        Self { host, port }
    }

    /// Connection URL for this endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (trace, debug, info, warn, error, or an `EnvFilter` string)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read observability settings using the given variable prefix.
    ///
    /// With prefix `REGISTRY`, reads `REGISTRY_LOG_LEVEL` and `REGISTRY_LOG_JSON`.
    #[must_use]
    pub fn from_vars(prefix: &str, vars: &HashMap<String, String>) -> Self {
        let log_level = vars
            .get(&format!("{prefix}_LOG_LEVEL"))
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_logs = vars
            .get(&format!("{prefix}_LOG_JSON"))
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Self {
            log_level,
            json_logs,
        }
    }
}
