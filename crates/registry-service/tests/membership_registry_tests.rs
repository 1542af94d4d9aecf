//! Membership registry behavior against the in-memory store.
//!
//! Covers expiry filtering, purge idempotence, retry counting, substring
//! filtering, malformed-token tolerance, failure tagging, and the
//! interleavings a concurrent writer can produce.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use registry_service::codec::{now_millis, Entry};
use registry_service::{MemberMatch, MembershipRegistry, RegistryError, StoreError};
use registry_test_utils::fixtures::{
    expired_token, expired_token_with_retries, unique_key, valid_token, valid_token_with_retries,
};
use registry_test_utils::{MockStore, StoreOp};

fn members_of(entries: &[Entry]) -> Vec<String> {
    let mut members: Vec<String> = entries.iter().map(|e| e.member.clone()).collect();
    members.sort();
    members
}

fn setup() -> (MockStore, MembershipRegistry, String) {
    let store = MockStore::new();
    let registry = MembershipRegistry::new(store.adapter());
    (store, registry, unique_key("registry"))
}

// ============================================================================
// add / list_valid
// ============================================================================

#[tokio::test]
async fn test_add_then_list_valid_returns_member() {
    let (store, registry, key) = setup();
    let before = now_millis();

    let entry = registry.add(&key, "token-A", 30, None).await.unwrap();

    assert_eq!(entry.member, "token-A");
    assert!(entry.expires_at >= before + 30_000);
    assert_eq!(entry.retry_count, None);
    assert_eq!(store.members(&key), vec![entry.encode().unwrap()]);

    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(valid, vec![entry]);
}

#[tokio::test]
async fn test_add_with_initial_retry_count() {
    let (_store, registry, key) = setup();

    registry.add(&key, "job-7", 60, Some(4)).await.unwrap();

    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].retry_count, Some(4));
}

#[tokio::test]
async fn test_add_same_member_twice_stores_distinct_tokens() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("dup", 10)]);

    registry.add(&key, "dup", 20, None).await.unwrap();

    assert_eq!(store.members(&key).len(), 2);
    assert_eq!(members_of(&registry.list_valid(&key).await.unwrap()), vec!["dup", "dup"]);
}

#[tokio::test]
async fn test_add_rejects_reserved_delimiter_without_writing() {
    let (store, registry, key) = setup();

    let result = registry.add(&key, "evil|EXP|1", 60, None).await;

    assert!(matches!(result, Err(RegistryError::InvalidMember(_))));
    assert_eq!(store.write_count(), 0);
    assert!(!store.set_exists(&key));
}

#[tokio::test]
async fn test_add_with_zero_seconds_is_immediately_expired() {
    let (_store, registry, key) = setup();

    registry.add(&key, "instant", 0, None).await.unwrap();

    assert!(registry.list_valid(&key).await.unwrap().is_empty());
    assert_eq!(registry.purge_expired(&key).await.unwrap(), 1);
}

#[tokio::test]
async fn test_list_valid_excludes_expired() {
    let (store, registry, key) = setup();
    store.insert_tokens(
        &key,
        &[
            valid_token("alive", 60),
            expired_token("dead"),
            valid_token_with_retries("retrying", 60, 2),
        ],
    );

    let valid = registry.list_valid(&key).await.unwrap();

    assert_eq!(members_of(&valid), vec!["alive", "retrying"]);
    // Reads never remove anything
    assert_eq!(store.members(&key).len(), 3);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_list_valid_on_missing_registry_is_empty() {
    let (_store, registry, key) = setup();
    assert!(registry.list_valid(&key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_valid_skips_malformed_tokens() {
    let (store, registry, key) = setup();
    store.insert_tokens(
        &key,
        &[
            valid_token("good", 60),
            "no-delimiter".to_string(),
            "bad|EXP|soon".to_string(),
            "bad|EXP|100|RC|many".to_string(),
        ],
    );

    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(members_of(&valid), vec!["good"]);
}

// ============================================================================
// Expiry scenario (real time)
// ============================================================================

#[tokio::test]
async fn test_expiry_scenario() {
    let (store, registry, key) = setup();

    registry.add(&key, "token-A", 1, None).await.unwrap();
    assert_eq!(members_of(&registry.list_valid(&key).await.unwrap()), vec!["token-A"]);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(registry.list_valid(&key).await.unwrap().is_empty());

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 1);
    assert!(!store.set_exists(&key));

    let writes = store.write_count();
    assert_eq!(registry.purge_expired(&key).await.unwrap(), 0);
    assert_eq!(store.write_count(), writes, "second purge must not write");
}

// ============================================================================
// purge_expired
// ============================================================================

#[tokio::test]
async fn test_purge_removes_only_expired() {
    let (store, registry, key) = setup();
    let keep = valid_token("keep", 60);
    store.insert_tokens(
        &key,
        &[
            keep.clone(),
            expired_token("old-1"),
            expired_token_with_retries("old-2", 3),
        ],
    );

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 2);
    assert_eq!(store.members(&key), vec![keep]);
    assert_eq!(store.call_count(StoreOp::SetRemove), 1);
}

#[tokio::test]
async fn test_purge_is_idempotent() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("keep", 60), expired_token("old")]);

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 1);
    let writes = store.write_count();
    let snapshot = store.members(&key);

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 0);
    assert_eq!(store.write_count(), writes);
    assert_eq!(store.members(&key), snapshot);
}

#[tokio::test]
async fn test_purge_with_nothing_expired_does_not_write() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("a", 60), valid_token("b", 60)]);

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_purge_leaves_malformed_tokens_alone() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[expired_token("old"), "garbage".to_string()]);

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 1);
    assert_eq!(store.members(&key), vec!["garbage".to_string()]);
}

#[tokio::test]
async fn test_purge_keeps_entry_added_concurrently() {
    let (store, registry, key) = setup();
    let late = valid_token("late", 60);
    store.insert_tokens(&key, &[expired_token("old")]);
    store.add_after_next_read(&key, &late);

    assert_eq!(registry.purge_expired(&key).await.unwrap(), 1);
    assert_eq!(store.members(&key), vec![late]);
}

// ============================================================================
// increment_retry
// ============================================================================

#[tokio::test]
async fn test_increment_retry_creates_count() {
    let (_store, registry, key) = setup();
    registry.add(&key, "job-1", 60, None).await.unwrap();

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);

    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].retry_count, Some(1));
}

#[tokio::test]
async fn test_increment_retry_n_times() {
    let (_store, registry, key) = setup();
    let added = registry.add(&key, "job-1", 60, None).await.unwrap();

    for _ in 0..5 {
        assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);
    }

    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].retry_count, Some(5));
    assert_eq!(valid[0].expires_at, added.expires_at);
}

#[tokio::test]
async fn test_increment_retry_exact_match_ignores_shared_prefix() {
    let (_store, registry, key) = setup();
    registry.add(&key, "job-1", 60, None).await.unwrap();
    registry.add(&key, "job-10", 60, Some(7)).await.unwrap();

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);

    let mut valid = registry.list_valid(&key).await.unwrap();
    valid.sort_by(|a, b| a.member.cmp(&b.member));
    assert_eq!(valid[0].member, "job-1");
    assert_eq!(valid[0].retry_count, Some(1));
    assert_eq!(valid[1].member, "job-10");
    assert_eq!(valid[1].retry_count, Some(7));
}

#[tokio::test]
async fn test_increment_retry_prefix_match() {
    let (_store, registry, key) = setup();
    registry.add(&key, "user:42:device:1", 60, None).await.unwrap();
    registry.add(&key, "user:42:device:2", 60, Some(1)).await.unwrap();
    registry.add(&key, "user:420:device:1", 60, None).await.unwrap();

    let updated = registry
        .increment_retry_matching(&key, "user:42:", MemberMatch::Prefix)
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let counts: std::collections::HashMap<String, Option<u64>> = registry
        .list_valid(&key)
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.member, e.retry_count))
        .collect();
    assert_eq!(counts["user:42:device:1"], Some(1));
    assert_eq!(counts["user:42:device:2"], Some(2));
    assert_eq!(counts["user:420:device:1"], None);
}

#[tokio::test]
async fn test_increment_retry_updates_expired_entries_too() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[expired_token_with_retries("job-1", 2)]);

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);

    let matched = registry.filter_by_key(&key, "job-1").await.unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].retry_count, Some(3));
}

#[tokio::test]
async fn test_increment_retry_keeps_entries_whose_tokens_chain() {
    // Same member and expiry, with and without a count: the first entry's
    // incremented token equals the second entry's current token.
    let expires_at = now_millis() + 60_000;
    let plain = Entry::new("m", expires_at, None).encode().unwrap();
    let counted = Entry::new("m", expires_at, Some(1)).encode().unwrap();

    // Set iteration order differs between stores, so cover both pair orders
    for _ in 0..32 {
        let (store, registry, key) = setup();
        store.insert_tokens(&key, &[plain.clone(), counted.clone()]);

        assert_eq!(registry.increment_retry(&key, "m").await.unwrap(), 2);

        let mut counts: Vec<Option<u64>> = registry
            .list_valid(&key)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.retry_count)
            .collect();
        counts.sort();
        assert_eq!(counts, vec![Some(1), Some(2)]);
    }
}

#[tokio::test]
async fn test_increment_retry_skips_saturated_count() {
    let (store, registry, key) = setup();
    let saturated = Entry::new("job-1", now_millis() + 60_000, Some(u64::MAX))
        .encode()
        .unwrap();
    store.insert_tokens(&key, &[saturated.clone()]);

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 0);
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.members(&key), vec![saturated]);
}

#[tokio::test]
async fn test_retry_count_beyond_u32_is_incremented() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token_with_retries("job-1", 60, 4_294_967_295)]);

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);
    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(valid[0].retry_count, Some(4_294_967_296));
}

#[tokio::test]
async fn test_increment_retry_without_match_does_not_write() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("other", 60)]);

    assert_eq!(registry.increment_retry(&key, "missing").await.unwrap(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_increment_retry_keeps_entry_added_concurrently() {
    let (store, registry, key) = setup();
    registry.add(&key, "job-1", 60, None).await.unwrap();
    let late = valid_token("job-2", 60);
    store.add_after_next_read(&key, &late);

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);

    assert!(store.members(&key).contains(&late));
    let valid = registry.list_valid(&key).await.unwrap();
    assert_eq!(members_of(&valid), vec!["job-1", "job-2"]);
}

#[tokio::test]
async fn test_increment_retry_does_not_resurrect_purged_entry() {
    let (store, registry, key) = setup();
    let token = expired_token("job-1");
    let keep = valid_token("job-2", 60);
    store.insert_tokens(&key, &[token.clone(), keep.clone()]);
    // Another client purges between our read and our swap
    store.remove_after_next_read(&key, &token);

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 0);
    assert_eq!(store.members(&key), vec![keep]);
}

#[tokio::test]
async fn test_increment_retry_skips_malformed_tokens() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("job-1", 60), "job-1|EXP|later".to_string()]);

    assert_eq!(registry.increment_retry(&key, "job-1").await.unwrap(), 1);
    assert!(store.members(&key).contains(&"job-1|EXP|later".to_string()));
}

// ============================================================================
// filter_by_key
// ============================================================================

#[tokio::test]
async fn test_filter_by_key_matches_substring_regardless_of_expiry() {
    let (store, registry, key) = setup();
    store.insert_tokens(
        &key,
        &[
            valid_token("order:100:email", 60),
            expired_token("order:101:sms"),
            valid_token("invoice:100", 60),
            valid_token("refund", 60),
        ],
    );

    let matched = registry.filter_by_key(&key, "100").await.unwrap();
    assert_eq!(members_of(&matched), vec!["invoice:100", "order:100:email"]);

    let matched = registry.filter_by_key(&key, "order:").await.unwrap();
    assert_eq!(members_of(&matched), vec!["order:100:email", "order:101:sms"]);

    assert!(registry.filter_by_key(&key, "nothing").await.unwrap().is_empty());
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_filter_by_key_only_searches_member_segment() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("alpha", 60)]);

    // The delimiter lives outside the member and must not match
    assert!(registry.filter_by_key(&key, "EXP").await.unwrap().is_empty());
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_store_failures_are_tagged_with_operation_and_key() {
    let (store, registry, key) = setup();
    store.fail(StoreOp::SetMembers);
    store.fail(StoreOp::SetAdd);

    let cases = [
        ("add", registry.add(&key, "m", 10, None).await.map(|_| ())),
        ("list_valid", registry.list_valid(&key).await.map(|_| ())),
        ("purge_expired", registry.purge_expired(&key).await.map(|_| ())),
        ("increment_retry", registry.increment_retry(&key, "m").await.map(|_| ())),
        ("filter_by_key", registry.filter_by_key(&key, "m").await.map(|_| ())),
    ];

    for (operation, result) in cases {
        let err = result.expect_err(operation);
        assert_eq!(err.operation(), Some(operation));
        assert_eq!(err.key(), Some(key.as_str()));
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            RegistryError::Store {
                source: StoreError::Transport(_),
                ..
            }
        ));
    }
}

#[tokio::test]
async fn test_purge_write_failure_propagates() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[expired_token("old")]);
    store.fail(StoreOp::SetRemove);

    let err = registry.purge_expired(&key).await.unwrap_err();
    assert_eq!(err.operation(), Some("purge_expired"));
    assert_eq!(store.members(&key).len(), 1);
}

#[tokio::test]
async fn test_increment_write_failure_propagates() {
    let (store, registry, key) = setup();
    store.insert_tokens(&key, &[valid_token("job-1", 60)]);
    store.fail(StoreOp::SetSwap);

    let err = registry.increment_retry(&key, "job-1").await.unwrap_err();
    assert_eq!(err.operation(), Some("increment_retry"));
    assert_eq!(registry.list_valid(&key).await.unwrap()[0].retry_count, None);
}
