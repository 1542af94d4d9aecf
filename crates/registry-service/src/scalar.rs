//! Scalar key store.
//!
//! Plain string keys with the store's native expiration. Shares the store
//! adapter with the membership registry but uses no token encoding.

use crate::errors::RegistryError;
use crate::store::StoreAdapter;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Get/set/update/delete over scalar keys.
#[derive(Clone)]
pub struct ScalarKeyStore {
    store: Arc<dyn StoreAdapter>,
}

impl ScalarKeyStore {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self { store }
    }

    /// Store `value` under `key`.
    ///
    /// With `expiration_in_seconds`, the key expires natively in the store.
    /// `None` and `Some(0)` both store the key without expiry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the write fails.
    #[instrument(skip_all, fields(key = %key, expiration_in_seconds = ?expiration_in_seconds))]
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        expiration_in_seconds: Option<u64>,
    ) -> Result<(), RegistryError> {
        self.write("set", key, value, expiration_in_seconds).await
    }

    /// Current value of `key`, or `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the read fails. A missing key is not an error.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        let value = self
            .store
            .get(key)
            .await
            .map_err(|e| RegistryError::store("get", key, e))?;

        debug!(
            target: "registry.scalar",
            key = %key,
            found = value.is_some(),
            "Retrieved key"
        );

        Ok(value)
    }

    /// Overwrite `key`. Same semantics as [`ScalarKeyStore::set`].
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the write fails.
    #[instrument(skip_all, fields(key = %key, expiration_in_seconds = ?expiration_in_seconds))]
    pub async fn update(
        &self,
        key: &str,
        value: &str,
        expiration_in_seconds: Option<u64>,
    ) -> Result<(), RegistryError> {
        self.write("update", key, value, expiration_in_seconds).await
    }

    /// Remove `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the delete fails.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        self.store
            .delete(key)
            .await
            .map_err(|e| RegistryError::store("delete", key, e))?;

        debug!(target: "registry.scalar", key = %key, "Deleted key");
        Ok(())
    }

    async fn write(
        &self,
        operation: &'static str,
        key: &str,
        value: &str,
        expiration_in_seconds: Option<u64>,
    ) -> Result<(), RegistryError> {
        // Redis rejects EX 0
        let ttl = expiration_in_seconds.filter(|seconds| *seconds > 0);

        self.store
            .set(key, value, ttl)
            .await
            .map_err(|e| RegistryError::store(operation, key, e))?;

        match ttl {
            Some(seconds) => debug!(
                target: "registry.scalar",
                key = %key,
                operation = operation,
                expiration_in_seconds = seconds,
                "Stored key with expiration"
            ),
            None => debug!(
                target: "registry.scalar",
                key = %key,
                operation = operation,
                "Stored key without expiration"
            ),
        }

        Ok(())
    }
}
