//! Registry Service
//!
//! Hosts the membership registry's process lifecycle: connects to Redis once,
//! runs the purge sweeper over the configured registry keys, exposes metrics,
//! and disconnects on shutdown.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (plain or JSON)
//! 3. Install Prometheus metrics recorder and listener
//! 4. Connect to Redis (`RedisStore`) and verify with PING
//! 5. Spawn the purge sweeper (if any keys are configured)
//! 6. Wait for shutdown signal, stop the sweeper, close the connection

#![warn(clippy::pedantic)]

use std::sync::Arc;

use common::secret::ExposeSecret;
use registry_service::config::Config;
use registry_service::observability::metrics::init_metrics_recorder;
use registry_service::redis::RedisStore;
use registry_service::registry::MembershipRegistry;
use registry_service::store::StoreAdapter;
use registry_service::tasks::{start_purge_sweeper, PurgeSweeperConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration is loaded before tracing so the log settings can apply
    let config = Config::from_env()?;

    // Event targets are `registry.*`, which the `registry` directive also covers
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        if level.contains('=') {
            EnvFilter::new(level)
        } else {
            EnvFilter::new(format!("registry={level}"))
        }
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Registry Service");
    info!(
        purge_interval_seconds = config.purge_interval_seconds,
        purge_keys = ?config.purge_keys,
        metrics_bind_address = %config.metrics_bind_address,
        "Configuration loaded successfully"
    );

    init_metrics_recorder(config.metrics_bind_address).map_err(|e| {
        error!(error = %e, "Failed to initialize metrics");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    info!("Connecting to Redis...");
    let store = RedisStore::connect(config.redis_url.expose_secret())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to Redis");
            e
        })?;
    store.ping().await.map_err(|e| {
        error!(error = %e, "Redis did not answer PING");
        e
    })?;
    info!("Redis connection established");

    let adapter: Arc<dyn StoreAdapter> = Arc::new(store.clone());
    let membership = MembershipRegistry::new(adapter);

    let cancel_token = CancellationToken::new();
    let sweeper_config = PurgeSweeperConfig::from(&config);
    let sweeper_handle = if sweeper_config.keys.is_empty() {
        info!("No registry keys configured for purging, sweeper disabled");
        None
    } else {
        Some(tokio::spawn(start_purge_sweeper(
            membership.clone(),
            sweeper_config,
            cancel_token.child_token(),
        )))
    };

    shutdown_signal().await;
    info!("Shutdown signal received, stopping Registry Service");
    cancel_token.cancel();

    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Purge sweeper task ended abnormally");
        }
    }

    // Registry clones hold connection handles of their own
    drop(membership);
    store.close();
    info!("Registry Service stopped");

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
