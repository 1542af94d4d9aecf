//! In-memory store adapter for registry tests.
//!
//! Mirrors the Redis behaviors the registry relies on:
//! - Sets disappear when their last element is removed
//! - Scalar keys expire after their TTL (measured with `tokio::time::Instant`,
//!   so `start_paused` tests can advance time)
//! - `set_swap` is atomic with respect to other calls
//!
//! Tests can also make operations fail, count writes, and inject a concurrent
//! writer between a registry's read and its follow-up write.
//!
//! # Example
//!
//! ```rust,ignore
//! use registry_test_utils::{MockStore, StoreOp};
//!
//! let store = MockStore::new();
//! store.fail(StoreOp::SetMembers);
//!
//! let registry = MembershipRegistry::new(store.adapter());
//! assert!(registry.list_valid("jobs").await.is_err());
//! ```

use async_trait::async_trait;
use registry_service::store::{StoreAdapter, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Store adapter operations, for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Set,
    Delete,
    SetAdd,
    SetRemove,
    SetMembers,
    SetSwap,
}

impl StoreOp {
    fn is_write(self) -> bool {
        !matches!(self, StoreOp::Get | StoreOp::SetMembers)
    }
}

/// A write applied by a simulated concurrent client.
#[derive(Debug, Clone)]
enum Interleaved {
    Add(String),
    Remove(String),
}

/// In-memory store adapter.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

#[derive(Debug, Default)]
struct MockStoreInner {
    /// Scalar values with optional expiration
    kv: HashMap<String, (String, Option<Instant>)>,
    /// Set values
    sets: HashMap<String, HashSet<String>>,
    /// Operations that currently fail
    failing: HashSet<StoreOp>,
    /// Successful calls per operation
    calls: HashMap<StoreOp, usize>,
    /// Writes applied right after the next `set_members` on a key
    after_read: HashMap<String, Vec<Interleaved>>,
}

impl MockStoreInner {
    fn begin(&mut self, op: StoreOp) -> Result<(), StoreError> {
        if self.failing.contains(&op) {
            return Err(StoreError::Transport(format!("injected {op:?} failure")));
        }
        *self.calls.entry(op).or_default() += 1;
        Ok(())
    }

    fn remove_from_set(&mut self, key: &str, member: &str) -> bool {
        let Some(set) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.sets.remove(key);
        }
        removed
    }
}

impl MockStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The store as a shared adapter, ready for `MembershipRegistry::new`.
    pub fn adapter(&self) -> Arc<dyn StoreAdapter> {
        Arc::new(self.clone())
    }

    /// Seed a set with raw tokens.
    #[must_use]
    pub fn with_tokens(self, key: &str, tokens: &[String]) -> Self {
        self.insert_tokens(key, tokens);
        self
    }

    /// Add raw tokens to a set, bypassing failure injection and accounting.
    pub fn insert_tokens(&self, key: &str, tokens: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .sets
            .entry(key.to_string())
            .or_default()
            .extend(tokens.iter().cloned());
    }

    /// Current elements of a set, sorted.
    pub fn members(&self, key: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut members: Vec<String> = inner
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Whether the set exists at all (Redis drops empty sets).
    pub fn set_exists(&self, key: &str) -> bool {
        self.inner.lock().unwrap().sets.contains_key(key)
    }

    /// Make every call to `op` fail with a transport error.
    pub fn fail(&self, op: StoreOp) {
        self.inner.lock().unwrap().failing.insert(op);
    }

    /// Stop failing all operations.
    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failing.clear();
    }

    /// Successful calls of `op` so far.
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Successful write calls of any kind so far.
    pub fn write_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| op.is_write())
            .map(|(_, count)| count)
            .sum()
    }

    /// Simulate another client adding `token` to `key` right after the next
    /// read of that set.
    pub fn add_after_next_read(&self, key: &str, token: &str) {
        self.push_after_read(key, Interleaved::Add(token.to_string()));
    }

    /// Simulate another client removing `token` from `key` right after the
    /// next read of that set.
    pub fn remove_after_next_read(&self, key: &str, token: &str) {
        self.push_after_read(key, Interleaved::Remove(token.to_string()));
    }

    fn push_after_read(&self, key: &str, write: Interleaved) {
        self.inner
            .lock()
            .unwrap()
            .after_read
            .entry(key.to_string())
            .or_default()
            .push(write);
    }

    /// Raw scalar value ignoring expiration, with remaining TTL if any.
    pub fn scalar(&self, key: &str) -> Option<(String, Option<Duration>)> {
        let inner = self.inner.lock().unwrap();
        inner.kv.get(key).map(|(value, expires_at)| {
            (
                value.clone(),
                expires_at.map(|at| at.saturating_duration_since(Instant::now())),
            )
        })
    }
}

#[async_trait]
impl StoreAdapter for MockStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::Get)?;

        let expired = matches!(
            inner.kv.get(key),
            Some((_, Some(expires_at))) if Instant::now() >= *expires_at
        );
        if expired {
            inner.kv.remove(key);
            return Ok(None);
        }
        Ok(inner.kv.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::Set)?;

        let expires_at = ttl_seconds.map(|seconds| Instant::now() + Duration::from_secs(seconds));
        inner.sets.remove(key);
        inner
            .kv
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::Delete)?;

        inner.kv.remove(key);
        inner.sets.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::SetAdd)?;

        let set = inner.sets.entry(key.to_string()).or_default();
        let added = members
            .iter()
            .filter(|member| set.insert((*member).clone()))
            .count();
        Ok(added as u64)
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::SetRemove)?;

        let removed = members
            .iter()
            .filter(|member| inner.remove_from_set(key, member))
            .count();
        Ok(removed as u64)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::SetMembers)?;

        let members: Vec<String> = inner
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        // The concurrent client's writes land after this read returns
        if let Some(writes) = inner.after_read.remove(key) {
            for write in writes {
                match write {
                    Interleaved::Add(token) => {
                        inner.sets.entry(key.to_string()).or_default().insert(token);
                    }
                    Interleaved::Remove(token) => {
                        inner.remove_from_set(key, &token);
                    }
                }
            }
        }

        Ok(members)
    }

    async fn set_swap(&self, key: &str, swaps: &[(String, String)]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin(StoreOp::SetSwap)?;

        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(0);
        };

        // Same order as the Lua script: check all, remove all, then add all
        let applied: Vec<&(String, String)> =
            swaps.iter().filter(|(old, _)| set.contains(old)).collect();
        for (old, _) in &applied {
            set.remove(old);
        }
        for (_, new) in &applied {
            set.insert(new.clone());
        }
        Ok(applied.len() as u64)
    }
}
