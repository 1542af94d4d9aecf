//! Redis implementation of the store adapter.
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently, so every command clones it instead of sharing it behind a
//! lock. One `RedisStore` is opened at startup, shared via `Arc`, and closed at
//! shutdown.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = RedisStore::connect("redis://localhost:6379").await?;
//! let store: Arc<dyn StoreAdapter> = Arc::new(store);
//! let registry = MembershipRegistry::new(Arc::clone(&store));
//! ```

use crate::observability::metrics;
use crate::redis::lua_scripts;
use crate::store::{StoreAdapter, StoreError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Redis-backed store adapter.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    set_swap_script: Script,
}

impl RedisStore {
    /// Open the client and establish the multiplexed connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the URL is invalid or Redis is unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Note: Do NOT log redis_url as it may contain credentials
            error!(
                target: "registry.redis.client",
                error = %e,
                "Failed to open Redis client"
            );
            StoreError::Connection(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(
                    target: "registry.redis.client",
                    error = %e,
                    "Failed to connect to Redis"
                );
                StoreError::Connection(format!("Failed to connect to Redis: {e}"))
            })?;

        info!(target: "registry.redis.client", "Connected to Redis");

        Ok(Self {
            connection,
            set_swap_script: Script::new(lua_scripts::SET_SWAP),
        })
    }

    /// Round-trip a `PING` to verify the connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the command fails.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let started = Instant::now();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| transport_error("ping", e))?;
        metrics::record_store_latency("ping", started.elapsed());

        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Transport(format!("Unexpected PING reply: {reply}")))
        }
    }

    /// Close the connection.
    ///
    /// The multiplexed connection shuts down once the last clone is dropped,
    /// so every adapter built from this store must be dropped first.
    pub fn close(self) {
        drop(self.connection);
        info!(target: "registry.redis.client", "Disconnected from Redis");
    }
}

/// Log, count, and wrap a failed Redis command.
fn transport_error(operation: &'static str, e: RedisError) -> StoreError {
    warn!(
        target: "registry.redis.client",
        error = %e,
        operation = operation,
        "Redis command failed"
    );
    metrics::record_store_error(operation);
    StoreError::Transport(format!("{operation} failed: {e}"))
}

#[async_trait]
impl StoreAdapter for RedisStore {
    #[instrument(skip_all, fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let started = Instant::now();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| transport_error("get", e))?;
        metrics::record_store_latency("get", started.elapsed());
        Ok(value)
    }

    #[instrument(skip_all, fields(key = %key, ttl_seconds = ?ttl_seconds))]
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let started = Instant::now();
        match ttl_seconds {
            Some(seconds) => {
                let _: () = conn
                    .set_ex(key, value, seconds)
                    .await
                    .map_err(|e| transport_error("set", e))?;
            }
            None => {
                let _: () = conn
                    .set(key, value)
                    .await
                    .map_err(|e| transport_error("set", e))?;
            }
        }
        metrics::record_store_latency("set", started.elapsed());
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let started = Instant::now();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| transport_error("delete", e))?;
        metrics::record_store_latency("delete", started.elapsed());
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key, count = members.len()))]
    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        // SADD with no members is a Redis syntax error
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let started = Instant::now();
        let added: u64 = conn
            .sadd(key, members)
            .await
            .map_err(|e| transport_error("set_add", e))?;
        metrics::record_store_latency("set_add", started.elapsed());
        Ok(added)
    }

    #[instrument(skip_all, fields(key = %key, count = members.len()))]
    async fn set_remove(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let started = Instant::now();
        let removed: u64 = conn
            .srem(key, members)
            .await
            .map_err(|e| transport_error("set_remove", e))?;
        metrics::record_store_latency("set_remove", started.elapsed());
        Ok(removed)
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        let started = Instant::now();
        let members: Vec<String> = conn
            .smembers(key)
            .await
            .map_err(|e| transport_error("set_members", e))?;
        metrics::record_store_latency("set_members", started.elapsed());
        Ok(members)
    }

    #[instrument(skip_all, fields(key = %key, count = swaps.len()))]
    async fn set_swap(&self, key: &str, swaps: &[(String, String)]) -> Result<u64, StoreError> {
        if swaps.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();

        let mut invocation = self.set_swap_script.prepare_invoke();
        invocation.key(key);
        for (old, new) in swaps {
            invocation.arg(old).arg(new);
        }

        let started = Instant::now();
        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| transport_error("set_swap", e))?;
        metrics::record_store_latency("set_swap", started.elapsed());

        let swapped = u64::try_from(result).map_err(|_| {
            error!(
                target: "registry.redis.client",
                key = %key,
                result = result,
                "Set swap script rejected its arguments"
            );
            metrics::record_store_error("set_swap");
            StoreError::Transport(format!("set_swap script returned {result}"))
        })?;

        debug!(
            target: "registry.redis.client",
            key = %key,
            requested = swaps.len(),
            swapped = swapped,
            "Swapped set elements"
        );

        Ok(swapped)
    }
}
