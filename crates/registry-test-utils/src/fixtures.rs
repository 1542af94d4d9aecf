//! Token fixtures for registry tests.
//!
//! Tokens are built through the production codec so tests never depend on a
//! hand-written copy of the encoding.

use registry_service::codec::{now_millis, Entry};

/// Registry key unique to one test, e.g. `jobs:3f2a...`.
pub fn unique_key(prefix: &str) -> String {
    format!("{prefix}:{}", uuid::Uuid::new_v4().simple())
}

/// Token for `member` that expired one minute ago.
pub fn expired_token(member: &str) -> String {
    token(&Entry::new(member, now_millis().saturating_sub(60_000), None))
}

/// Token for `member` that expired one minute ago, with a retry count.
pub fn expired_token_with_retries(member: &str, retry_count: u64) -> String {
    token(&Entry::new(
        member,
        now_millis().saturating_sub(60_000),
        Some(retry_count),
    ))
}

/// Token for `member` valid for another `seconds`.
pub fn valid_token(member: &str, seconds: u64) -> String {
    token(&Entry::expiring_in(member, seconds, None, now_millis()))
}

/// Token for `member` valid for another `seconds`, with a retry count.
pub fn valid_token_with_retries(member: &str, seconds: u64, retry_count: u64) -> String {
    token(&Entry::expiring_in(
        member,
        seconds,
        Some(retry_count),
        now_millis(),
    ))
}

fn token(entry: &Entry) -> String {
    entry
        .encode()
        .unwrap_or_else(|e| panic!("fixture member must be encodable: {e}"))
}
