//! Step records as stored on the ledger
//!
//! A record is one participant submission. The step count itself lives on the
//! ledger as ciphertext until a verified decryption reveals it; `public_value1`
//! carries an unencrypted mirror for display.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every client-generated record id
pub const RECORD_ID_PREFIX: &str = "steps";

/// Number of address characters (after `0x`) folded into a record id
const ADDRESS_SLICE_LEN: usize = 6;

/// Opaque record identifier, assigned once by the uploading client
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a fresh id from the creation time and the creator's address.
    ///
    /// Format: `steps-<unix millis>-<address chars 2..8>`. Two uploads from the
    /// same account within one millisecond produce the same id.
    pub fn generate(address: &str, now: DateTime<Utc>) -> Self {
        let trimmed = address.strip_prefix("0x").unwrap_or(address);
        let slice: String = trimmed.chars().take(ADDRESS_SLICE_LEN).collect();
        Self(format!(
            "{}-{}-{}",
            RECORD_ID_PREFIX,
            now.timestamp_millis(),
            slice
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One participant submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: RecordId,
    pub name: String,
    pub creator: String,
    /// Ledger-assigned creation time (seconds since epoch)
    pub timestamp: i64,
    /// Plaintext mirror of the step count
    #[serde(default)]
    pub public_value1: u32,
    /// Reserved, zero in this flow
    #[serde(default)]
    pub public_value2: u32,
    #[serde(default)]
    pub is_verified: bool,
    /// Revealed step count; zero while unverified
    #[serde(default)]
    pub decrypted_value: u32,
    /// Position among verified records, recomputed on every load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl StepRecord {
    /// Revealed step count, only for verified records
    pub fn steps(&self) -> Option<u32> {
        self.is_verified.then_some(self.decrypted_value)
    }

    /// Case-insensitive creator match
    pub fn is_created_by(&self, address: &str) -> bool {
        self.creator.eq_ignore_ascii_case(address)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    /// `YYYY-MM-DD` creation date, empty if the timestamp is out of range
    pub fn created_date(&self) -> String {
        self.created_at()
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    pub fn short_creator(&self) -> String {
        short_address(&self.creator)
    }

    pub fn steps_display(&self) -> String {
        match self.steps() {
            Some(steps) => format!("{} steps", steps),
            None => "Encrypted".to_string(),
        }
    }

    pub fn rank_display(&self) -> String {
        match self.rank {
            Some(rank) => format!("#{}", rank),
            None => "--".to_string(),
        }
    }
}

/// Shorten an address to `0x1234...abcd`
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Parse a user-supplied step count.
///
/// Leading zeros are accepted (`"007"` is 7). Negative, non-numeric and empty
/// input all become 0. Values that do not fit in `u32` yield `None`.
pub fn parse_steps(input: &str) -> Option<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(0);
    }
    trimmed.parse::<u32>().ok()
}
