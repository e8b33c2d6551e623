//! Content fingerprints for change detection
//!
//! A fingerprint covers exactly the fields whose divergence should trigger a
//! resync: the calendar date (never a time of day) and the title. Free-text
//! description and display times are excluded.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Truncated SHA-256 over the canonical `(date, title)` encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the fingerprint of a `(date, title)` pair.
    ///
    /// The date is encoded as `YYYY-MM-DD`, which has a fixed width, so the
    /// `date:title` encoding is unambiguous for any title.
    #[must_use]
    pub fn compute(date: NaiveDate, title: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
        hasher.update(b":");
        hasher.update(title.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..FINGERPRINT_LEN].to_string())
    }

    /// Wrap a fingerprint previously persisted on a mirror record.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the hex string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
