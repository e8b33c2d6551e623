//! Sync type definitions
//!
//! Enums and small value types shared by the engine and its collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Source record to mirror record.
    Forward,
    /// Mirror record back to source record.
    Reverse,
}

impl Direction {
    /// Both directions.
    #[must_use]
    pub fn all() -> &'static [Direction] {
        &[Direction::Forward, Direction::Reverse]
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side last legitimately authored a mirror record's current date.
///
/// Sync decisions run on fingerprints; the tag records provenance and marks
/// the handoff a forward write completes after a pushed mirror edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginTag {
    /// Written by the forward pass from the source record.
    Authoritative,
    /// A mirror-side edit that the reverse pass pushed to the source record.
    MirrorEdited,
}

impl OriginTag {
    /// Get the string representation stored in mirror metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginTag::Authoritative => "authoritative",
            OriginTag::MirrorEdited => "mirror_edited",
        }
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OriginTag {
    type Err = ParseOriginTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "authoritative" => Ok(OriginTag::Authoritative),
            "mirror_edited" => Ok(OriginTag::MirrorEdited),
            _ => Err(ParseOriginTagError(s.to_string())),
        }
    }
}

/// Error parsing an origin tag from string.
#[derive(Debug, Clone)]
pub struct ParseOriginTagError(String);

impl fmt::Display for ParseOriginTagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid origin tag '{}', expected one of: authoritative, mirror_edited",
            self.0
        )
    }
}

impl std::error::Error for ParseOriginTagError {}

/// Category predicate selecting which source records participate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryFilter(String);

impl CategoryFilter {
    /// Create a filter for the given category name.
    pub fn new(category: impl Into<String>) -> Self {
        Self(category.into())
    }

    /// The category name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive match against a record's category.
    #[must_use]
    pub fn matches(&self, category: &str) -> bool {
        self.0.eq_ignore_ascii_case(category.trim())
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::new("milestone")
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing filter understood by the mirror system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MirrorFilter {
    /// Records carrying this engine's sync metadata.
    ManagedTag,
    /// Records whose title contains the marker text.
    TitleMarker(String),
}

impl fmt::Display for MirrorFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorFilter::ManagedTag => write!(f, "managed_tag"),
            MirrorFilter::TitleMarker(marker) => write!(f, "title_marker({marker})"),
        }
    }
}
