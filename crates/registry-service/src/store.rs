//! Store adapter seam.
//!
//! The registry and the scalar key store never talk to Redis directly. They
//! consume a [`StoreAdapter`], which production wires to
//! [`RedisStore`](crate::redis::RedisStore) and tests wire to an in-memory
//! implementation.
//!
//! The adapter assumes the backing store serializes each primitive. Nothing
//! here wraps several primitives in a transaction; [`StoreAdapter::set_swap`]
//! is the one primitive that performs a conditional multi-element update, and
//! it must be atomic on the store side.

use async_trait::async_trait;
use thiserror::Error;

/// Store adapter failure.
///
/// A missing key is never an error: [`StoreAdapter::get`] returns `Ok(None)`
/// and set reads of a missing key return an empty list.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open or re-establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Command was sent but failed (network, server rejection, bad reply).
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Key-value and set primitives consumed by the registry.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Read a scalar value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a scalar value, with a native TTL when `ttl_seconds` is given.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>)
        -> Result<(), StoreError>;

    /// Delete a key of any type. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Add elements to a set. Returns how many were not already present.
    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64, StoreError>;

    /// Remove elements from a set. Returns how many were present.
    async fn set_remove(&self, key: &str, members: &[String]) -> Result<u64, StoreError>;

    /// All elements of a set, unordered.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Replace each `old` element with its `new` element, atomically, only
    /// where `old` is still a member at the time of the swap.
    ///
    /// Returns the number of pairs applied.
    async fn set_swap(&self, key: &str, swaps: &[(String, String)]) -> Result<u64, StoreError>;
}
