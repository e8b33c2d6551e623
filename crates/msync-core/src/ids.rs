//! Record identifier types
//!
//! Newtype wrappers for the identifiers of both record spaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a record in the authoritative (source) system.
///
/// Opaque and stable: the engine never interprets it beyond the id schemes
/// in [`crate::identity`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Create a SourceId from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for SourceId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a record in the mirror system.
///
/// Mirror ids of managed records are always derived from a [`SourceId`];
/// ids listed from the mirror system may be foreign.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorId(String);

impl MirrorId {
    /// Create a MirrorId from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MirrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MirrorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque optimistic-concurrency token issued by the source system.
///
/// Every mutating write to the source system must present the token read
/// immediately before it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionToken(String);

impl RevisionToken {
    /// Create a RevisionToken from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RevisionToken {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}
