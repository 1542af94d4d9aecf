//! Purge sweeper background task.
//!
//! Reads never remove expired entries, so a registry that is only read
//! accumulates garbage. The sweeper calls
//! [`MembershipRegistry::purge_expired`] for each configured key on a fixed
//! interval.
//!
//! # Graceful Shutdown
//!
//! The task exits when its cancellation token is cancelled. A sweep in
//! progress finishes before the task checks the token again.

use crate::config::{Config, DEFAULT_PURGE_INTERVAL_SECONDS};
use crate::registry::MembershipRegistry;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Configuration for the purge sweeper.
#[derive(Debug, Clone)]
pub struct PurgeSweeperConfig {
    /// Sweep interval in seconds.
    pub interval_seconds: u64,
    /// Registry keys to purge each sweep.
    pub keys: Vec<String>,
}

impl Default for PurgeSweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_PURGE_INTERVAL_SECONDS,
            keys: Vec::new(),
        }
    }
}

impl From<&Config> for PurgeSweeperConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval_seconds: config.purge_interval_seconds,
            keys: config.purge_keys.clone(),
        }
    }
}

/// Run the purge sweeper until `cancel_token` is cancelled.
///
/// The first sweep runs immediately. Failures on one key are logged and do
/// not stop the sweep of the remaining keys or later sweeps.
#[instrument(skip_all, name = "registry.task.purge_sweeper")]
pub async fn start_purge_sweeper(
    registry: MembershipRegistry,
    config: PurgeSweeperConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "registry.task.purge_sweeper",
        interval_seconds = config.interval_seconds,
        key_count = config.keys.len(),
        "Starting purge sweeper"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_seconds.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_sweep(&registry, &config.keys).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "registry.task.purge_sweeper",
                    "Purge sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "registry.task.purge_sweeper", "Purge sweeper stopped");
}

/// Purge every key once. Returns the total number of entries removed.
pub async fn run_sweep(registry: &MembershipRegistry, keys: &[String]) -> u64 {
    let mut total = 0;

    for key in keys {
        match registry.purge_expired(key).await {
            Ok(removed) => total += removed,
            Err(e) => {
                error!(
                    target: "registry.task.purge_sweeper",
                    key = %key,
                    error = %e,
                    "Failed to purge registry"
                );
            }
        }
    }

    total
}
