//! Expiring tracked-membership registry.
//!
//! A registry is one store set addressed by its key. Each element is an
//! encoded [`Entry`] token carrying its own expiration and optional retry
//! count, which the store itself knows nothing about. Validity is computed at
//! read time; expired tokens stay in the set until [`MembershipRegistry::purge_expired`]
//! removes them.
//!
//! # Consistency
//!
//! Every operation is a single logical unit over the store, but none of them
//! takes a lock. Under concurrent writers on the same key:
//!
//! - `purge_expired` removes only tokens whose own timestamp has passed, so a
//!   concurrent `add` is never lost and a valid entry is never removed.
//! - `increment_retry` rewrites only the matched tokens through an atomic
//!   per-token swap. Concurrent adds survive, and a token purged in between is
//!   not brought back. Two concurrent increments of the same member may
//!   collapse into one. Callers that need exact counts must serialize access
//!   per key.
//!
//! Malformed tokens never abort a bulk operation. They are skipped, logged,
//! and counted in `registry_decode_failures_total`.

use crate::codec::{now_millis, Entry};
use crate::errors::RegistryError;
use crate::observability::metrics;
use crate::store::StoreAdapter;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How `increment_retry_matching` selects entries by member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberMatch {
    /// Decoded member equals the argument.
    #[default]
    Exact,
    /// Decoded member starts with the argument. For composite member ids
    /// such as `user:42:device:7`, matched by `user:42:`.
    Prefix,
}

impl MemberMatch {
    fn matches(self, candidate: &str, member: &str) -> bool {
        match self {
            MemberMatch::Exact => candidate == member,
            MemberMatch::Prefix => candidate.starts_with(member),
        }
    }
}

/// A stored token together with its decoded entry.
///
/// Writes that target existing elements must use the raw token, which may
/// differ from a fresh encoding of the entry.
struct StoredEntry {
    token: String,
    entry: Entry,
}

/// Membership registry over a store adapter.
///
/// Cheap to clone; clones share the adapter.
#[derive(Clone)]
pub struct MembershipRegistry {
    store: Arc<dyn StoreAdapter>,
}

impl MembershipRegistry {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self { store }
    }

    /// Add `member` to the registry, expiring `expiration_in_seconds` from now.
    ///
    /// Entries are deduplicated by exact token only: adding the same member
    /// twice with different expirations stores two elements.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidMember` if the member contains a reserved delimiter
    /// - `RegistryError::Store` if the set write fails
    #[instrument(skip_all, fields(key = %key, expiration_in_seconds = expiration_in_seconds))]
    pub async fn add(
        &self,
        key: &str,
        member: &str,
        expiration_in_seconds: u64,
        retry_count: Option<u64>,
    ) -> Result<Entry, RegistryError> {
        let entry = Entry::expiring_in(member, expiration_in_seconds, retry_count, now_millis());
        let token = entry.encode()?;

        let added = self
            .store
            .set_add(key, std::slice::from_ref(&token))
            .await
            .map_err(|e| RegistryError::store("add", key, e))?;

        debug!(
            target: "registry.membership",
            key = %key,
            expires_at = entry.expires_at,
            retry_count = ?entry.retry_count,
            already_present = added == 0,
            "Added member"
        );

        Ok(entry)
    }

    /// Entries whose expiration is still in the future.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the set cannot be read.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn list_valid(&self, key: &str) -> Result<Vec<Entry>, RegistryError> {
        let stored = self.load(key, "list_valid").await?;
        let now = now_millis();

        let valid: Vec<Entry> = stored
            .into_iter()
            .map(|s| s.entry)
            .filter(|entry| entry.is_valid_at(now))
            .collect();

        debug!(
            target: "registry.membership",
            key = %key,
            valid_count = valid.len(),
            "Listed valid members"
        );

        Ok(valid)
    }

    /// Remove every expired token in one set removal.
    ///
    /// Returns the number of tokens removed. When nothing has expired the
    /// store is not written at all.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the set cannot be read or written.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn purge_expired(&self, key: &str) -> Result<u64, RegistryError> {
        let stored = self.load(key, "purge_expired").await?;
        let now = now_millis();

        let expired: Vec<String> = stored
            .into_iter()
            .filter(|s| !s.entry.is_valid_at(now))
            .map(|s| s.token)
            .collect();

        if expired.is_empty() {
            debug!(
                target: "registry.membership",
                key = %key,
                "No expired members to remove"
            );
            return Ok(0);
        }

        let removed = self
            .store
            .set_remove(key, &expired)
            .await
            .map_err(|e| RegistryError::store("purge_expired", key, e))?;

        metrics::record_entries_purged(removed);
        info!(
            target: "registry.membership",
            key = %key,
            removed = removed,
            "Removed expired members"
        );

        Ok(removed)
    }

    /// Increment the retry count of every entry whose member equals `member`.
    ///
    /// An entry without a retry count gets a count of 1. Returns the number of
    /// entries updated.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the set cannot be read or written.
    pub async fn increment_retry(&self, key: &str, member: &str) -> Result<u64, RegistryError> {
        self.increment_retry_matching(key, member, MemberMatch::Exact)
            .await
    }

    /// Increment the retry count of every entry selected by `mode`.
    ///
    /// Only the matched tokens are rewritten, each through an atomic swap that
    /// applies only if the old token is still present. Expired entries are
    /// incremented like valid ones. Entries whose count is already at
    /// `u64::MAX` are left as they are and not counted.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the set cannot be read or written.
    #[instrument(skip_all, fields(key = %key, mode = ?mode))]
    pub async fn increment_retry_matching(
        &self,
        key: &str,
        member: &str,
        mode: MemberMatch,
    ) -> Result<u64, RegistryError> {
        let stored = self.load(key, "increment_retry").await?;

        let mut swaps = Vec::new();
        for StoredEntry { token, entry } in stored {
            if !mode.matches(&entry.member, member) {
                continue;
            }
            match entry.with_incremented_retry().encode() {
                Ok(updated) if updated == token => {
                    debug!(
                        target: "registry.membership",
                        key = %key,
                        "Retry count already saturated, leaving entry unchanged"
                    );
                }
                Ok(updated) => swaps.push((token, updated)),
                Err(e) => {
                    // Written by another client with a member we refuse to encode
                    warn!(
                        target: "registry.membership",
                        key = %key,
                        error = %e,
                        "Skipping entry that cannot be re-encoded"
                    );
                    metrics::record_decode_failure("increment_retry");
                }
            }
        }

        if swaps.is_empty() {
            debug!(
                target: "registry.membership",
                key = %key,
                "No matching members to increment"
            );
            return Ok(0);
        }

        let swapped = self
            .store
            .set_swap(key, &swaps)
            .await
            .map_err(|e| RegistryError::store("increment_retry", key, e))?;

        if swapped < swaps.len() as u64 {
            debug!(
                target: "registry.membership",
                key = %key,
                matched = swaps.len(),
                swapped = swapped,
                "Some matched members changed before the swap"
            );
        }

        metrics::record_retry_increments(swapped);
        debug!(
            target: "registry.membership",
            key = %key,
            updated = swapped,
            "Incremented retry count"
        );

        Ok(swapped)
    }

    /// Entries whose member contains `filter_key`, expired or not.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Store` if the set cannot be read.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn filter_by_key(
        &self,
        key: &str,
        filter_key: &str,
    ) -> Result<Vec<Entry>, RegistryError> {
        let stored = self.load(key, "filter_by_key").await?;

        let filtered: Vec<Entry> = stored
            .into_iter()
            .map(|s| s.entry)
            .filter(|entry| entry.member.contains(filter_key))
            .collect();

        debug!(
            target: "registry.membership",
            key = %key,
            matched = filtered.len(),
            "Filtered members by key"
        );

        Ok(filtered)
    }

    /// Read and decode all tokens, skipping malformed ones.
    async fn load(
        &self,
        key: &str,
        operation: &'static str,
    ) -> Result<Vec<StoredEntry>, RegistryError> {
        let tokens = self
            .store
            .set_members(key)
            .await
            .map_err(|e| RegistryError::store(operation, key, e))?;

        Ok(tokens
            .into_iter()
            .filter_map(|token| match Entry::decode(&token) {
                Ok(entry) => Some(StoredEntry { token, entry }),
                Err(e) => {
                    warn!(
                        target: "registry.membership",
                        key = %key,
                        operation = operation,
                        token = %token,
                        error = %e,
                        "Skipping malformed registry token"
                    );
                    metrics::record_decode_failure(operation);
                    None
                }
            })
            .collect())
    }
}
