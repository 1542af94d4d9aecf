//! Entry codec.
//!
//! A Redis set element can only be a flat string, so each tracked entry is
//! stored as one token:
//!
//! - `<member>|EXP|<expires_at_millis>`
//! - `<member>|EXP|<expires_at_millis>|RC|<retry_count>`
//!
//! The member field is not escaped. Members containing either delimiter are
//! rejected at encode time; tokens written by other clients are decoded by
//! splitting on the first `|EXP|`.

use thiserror::Error;

/// Separates the member from the expiration timestamp.
pub const EXPIRATION_DELIMITER: &str = "|EXP|";

/// Separates the expiration timestamp from the retry count.
pub const RETRY_COUNT_DELIMITER: &str = "|RC|";

/// Token encoding or decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Token has no `|EXP|` segment.
    #[error("token has no expiration segment")]
    MissingExpiration,

    /// Expiration segment is not a non-negative integer.
    #[error("invalid expiration timestamp: {0:?}")]
    InvalidExpiration(String),

    /// Retry count segment is not a non-negative integer.
    #[error("invalid retry count: {0:?}")]
    InvalidRetryCount(String),

    /// Member contains a reserved delimiter and cannot be encoded unambiguously.
    #[error("member {0:?} contains a reserved delimiter")]
    ReservedDelimiter(String),
}

/// A tracked membership record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    /// Opaque member identifier.
    pub member: String,
    /// Absolute expiration, epoch milliseconds.
    pub expires_at: u64,
    /// Retry count, present once set explicitly or incremented.
    pub retry_count: Option<u64>,
}

impl Entry {
    pub fn new(member: impl Into<String>, expires_at: u64, retry_count: Option<u64>) -> Self {
        Self {
            member: member.into(),
            expires_at,
            retry_count,
        }
    }

    /// Entry expiring `expiration_in_seconds` after `now_millis`.
    pub fn expiring_in(
        member: impl Into<String>,
        expiration_in_seconds: u64,
        retry_count: Option<u64>,
        now_millis: u64,
    ) -> Self {
        let expires_at = now_millis.saturating_add(expiration_in_seconds.saturating_mul(1000));
        Self::new(member, expires_at, retry_count)
    }

    /// Valid while strictly before the expiration instant.
    pub fn is_valid_at(&self, now_millis: u64) -> bool {
        self.expires_at > now_millis
    }

    /// Copy of this entry with the retry count bumped by one.
    ///
    /// A missing count becomes 1.
    #[must_use]
    pub fn with_incremented_retry(&self) -> Self {
        let retry_count = Some(self.retry_count.map_or(1, |rc| rc.saturating_add(1)));
        Self {
            retry_count,
            ..self.clone()
        }
    }

    /// Encode into a stored token.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::ReservedDelimiter` if the member contains `|EXP|` or `|RC|`.
    pub fn encode(&self) -> Result<String, CodecError> {
        if self.member.contains(EXPIRATION_DELIMITER) || self.member.contains(RETRY_COUNT_DELIMITER)
        {
            return Err(CodecError::ReservedDelimiter(self.member.clone()));
        }

        Ok(match self.retry_count {
            Some(rc) => format!(
                "{}{EXPIRATION_DELIMITER}{}{RETRY_COUNT_DELIMITER}{rc}",
                self.member, self.expires_at
            ),
            None => format!("{}{EXPIRATION_DELIMITER}{}", self.member, self.expires_at),
        })
    }

    /// Decode a stored token.
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` if the token has no expiration segment or if the
    /// expiration or retry count is not a non-negative integer.
    pub fn decode(token: &str) -> Result<Self, CodecError> {
        let (member, remainder) = token
            .split_once(EXPIRATION_DELIMITER)
            .ok_or(CodecError::MissingExpiration)?;

        let (expiration, retry_count) = match remainder.split_once(RETRY_COUNT_DELIMITER) {
            Some((expiration, rc)) => (expiration, Some(parse_retry_count(rc)?)),
            None => (remainder, None),
        };

        Ok(Self {
            member: member.to_string(),
            expires_at: parse_expiration(expiration)?,
            retry_count,
        })
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

fn is_plain_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_expiration(s: &str) -> Result<u64, CodecError> {
    if !is_plain_digits(s) {
        return Err(CodecError::InvalidExpiration(s.to_string()));
    }
    s.parse()
        .map_err(|_| CodecError::InvalidExpiration(s.to_string()))
}

fn parse_retry_count(s: &str) -> Result<u64, CodecError> {
    if !is_plain_digits(s) {
        return Err(CodecError::InvalidRetryCount(s.to_string()));
    }
    s.parse()
        .map_err(|_| CodecError::InvalidRetryCount(s.to_string()))
}
