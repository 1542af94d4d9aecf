//! Registry error types.
//!
//! Store failures are tagged with the operation that issued them and the key
//! it addressed, so callers deciding whether to retry know exactly what failed.
//! Malformed tokens met during bulk reads are not errors; they are skipped and
//! reported through logs and metrics.

use crate::codec::CodecError;
use crate::store::StoreError;
use thiserror::Error;

/// Registry and scalar key store error type.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Store adapter failed while executing an operation.
    #[error("Store error during {operation} on key {key}: {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    /// Member cannot be encoded into a token.
    #[error("Invalid member: {0}")]
    InvalidMember(#[from] CodecError),
}

impl RegistryError {
    pub(crate) fn store(operation: &'static str, key: &str, source: StoreError) -> Self {
        RegistryError::Store {
            operation,
            key: key.to_string(),
            source,
        }
    }

    /// Name of the failing operation, if the failure came from the store.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            RegistryError::Store { operation, .. } => Some(*operation),
            RegistryError::InvalidMember(_) => None,
        }
    }

    /// Key addressed by the failing operation, if the failure came from the store.
    pub fn key(&self) -> Option<&str> {
        match self {
            RegistryError::Store { key, .. } => Some(key.as_str()),
            RegistryError::InvalidMember(_) => None,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Store failures are transient from the registry's point of view; an
    /// invalid member will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Store { .. })
    }
}
