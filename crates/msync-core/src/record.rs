//! Source and mirror record types
//!
//! [`SourceRecord`] is owned by the authoritative system, [`MirrorRecord`] by
//! the mirror system. Sync state travels on the mirror record itself as
//! [`SyncMetadata`]; there is no separate store.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SyncError, SyncResult};
use crate::fingerprint::ContentHash;
use crate::ids::{MirrorId, RevisionToken, SourceId};
use crate::types::OriginTag;

/// A record in the authoritative system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable identifier.
    pub id: SourceId,
    /// Subject line.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Milestone date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Start date, used when `date` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Due date, used when `date` and `start_date` are absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Open (true) or closed (false).
    pub is_active: bool,
    /// Concurrency token required on every write.
    pub revision_token: RevisionToken,
    /// Type/category name, e.g. "Milestone".
    pub category: String,
    /// Owning project name, rendered into the mirror title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl SourceRecord {
    /// Create an active record with no dates.
    pub fn new(
        id: impl Into<SourceId>,
        title: impl Into<String>,
        category: impl Into<String>,
        revision_token: RevisionToken,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            date: None,
            start_date: None,
            due_date: None,
            is_active: true,
            revision_token,
            category: category.into(),
            project: None,
        }
    }

    /// Set the milestone date.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the project name.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// The date the mirror tracks: `date`, else `start_date`, else `due_date`.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.date.or(self.start_date).or(self.due_date)
    }

    /// Like [`SourceRecord::effective_date`], failing with a validation error.
    pub fn require_date(&self) -> SyncResult<NaiveDate> {
        self.effective_date()
            .ok_or_else(|| SyncError::validation(self.id.as_str(), "record has no date"))
    }
}

/// Display form of a mirror record on its date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MirrorTiming {
    /// Occupies the whole day.
    AllDay { date: NaiveDate },
    /// Occupies a time window in a named time zone.
    Timed {
        start: NaiveDateTime,
        end: NaiveDateTime,
        time_zone: String,
    },
}

impl MirrorTiming {
    /// The calendar date the record is shown on.
    pub fn date(&self) -> NaiveDate {
        match self {
            MirrorTiming::AllDay { date } => *date,
            MirrorTiming::Timed { start, .. } => start.date(),
        }
    }

    /// The same display form moved to another date.
    ///
    /// A timed window keeps its start time of day, duration and zone.
    #[must_use]
    pub fn moved_to(&self, date: NaiveDate) -> Self {
        match self {
            MirrorTiming::AllDay { .. } => MirrorTiming::AllDay { date },
            MirrorTiming::Timed {
                start,
                end,
                time_zone,
            } => {
                let duration = *end - *start;
                let start = date.and_time(start.time());
                MirrorTiming::Timed {
                    start,
                    end: start + duration,
                    time_zone: time_zone.clone(),
                }
            }
        }
    }
}

/// Sync state persisted on a mirror record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Side that authored the current date.
    pub origin: OriginTag,
    /// Fingerprint of the record as last written by the engine.
    pub content_hash: ContentHash,
    /// Source record this mirror belongs to.
    pub source_id: SourceId,
}

impl SyncMetadata {
    /// Property key marking a record as managed.
    pub const SYNC_SOURCE_KEY: &'static str = "syncSource";
    /// Property key of the content hash.
    pub const CONTENT_HASH_KEY: &'static str = "contentHash";
    /// Property key of the source id.
    pub const SOURCE_ID_KEY: &'static str = "sourceId";
    /// Property key of the origin tag.
    pub const ORIGIN_TAG_KEY: &'static str = "originTag";
    /// Value written under [`SyncMetadata::SYNC_SOURCE_KEY`].
    pub const SYNC_SOURCE_VALUE: &'static str = "openproject";

    /// Encode as the mirror system's private string properties.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                Self::SYNC_SOURCE_KEY.to_string(),
                Self::SYNC_SOURCE_VALUE.to_string(),
            ),
            (
                Self::CONTENT_HASH_KEY.to_string(),
                self.content_hash.to_string(),
            ),
            (Self::SOURCE_ID_KEY.to_string(), self.source_id.to_string()),
            (Self::ORIGIN_TAG_KEY.to_string(), self.origin.to_string()),
        ])
    }

    /// Decode from private string properties.
    ///
    /// Returns `None` unless the record is marked as managed and carries a
    /// hash and source id. A missing origin tag reads as authoritative, which
    /// is what records written before tagging existed were.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Option<Self> {
        if properties.get(Self::SYNC_SOURCE_KEY).map(String::as_str)
            != Some(Self::SYNC_SOURCE_VALUE)
        {
            return None;
        }
        let content_hash = properties
            .get(Self::CONTENT_HASH_KEY)
            .filter(|value| !value.is_empty())?;
        let source_id = properties
            .get(Self::SOURCE_ID_KEY)
            .filter(|value| !value.is_empty())?;
        let origin = match properties.get(Self::ORIGIN_TAG_KEY) {
            Some(tag) => tag.parse().ok()?,
            None => OriginTag::Authoritative,
        };

        Some(Self {
            origin,
            content_hash: ContentHash::from_stored(content_hash.clone()),
            source_id: SourceId::new(source_id.clone()),
        })
    }
}

/// A record in the mirror system, as observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    /// Identifier in the mirror system.
    pub id: MirrorId,
    /// Title as currently shown.
    pub title: String,
    /// Description as currently shown.
    #[serde(default)]
    pub description: String,
    /// Date and display form; `None` if the mirror system reported neither.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<MirrorTiming>,
    /// Persisted sync state; `None` if absent or unreadable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SyncMetadata>,
}

impl MirrorRecord {
    /// The date currently shown.
    pub fn observed_date(&self) -> Option<NaiveDate> {
        self.timing.as_ref().map(MirrorTiming::date)
    }

    /// Fingerprint freshly computed from the currently observed fields.
    pub fn observed_hash(&self) -> Option<ContentHash> {
        self.observed_date()
            .map(|date| ContentHash::compute(date, &self.title))
    }

    /// Fingerprint persisted by the last engine write.
    pub fn stored_hash(&self) -> Option<&ContentHash> {
        self.metadata.as_ref().map(|metadata| &metadata.content_hash)
    }

    /// Origin tag persisted by the last engine write.
    pub fn origin(&self) -> Option<OriginTag> {
        self.metadata.as_ref().map(|metadata| metadata.origin)
    }

    /// A draft reproducing the observed fields with new metadata.
    pub fn restamped(&self, metadata: SyncMetadata) -> Option<MirrorDraft> {
        Some(MirrorDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            timing: self.timing.clone()?,
            metadata,
        })
    }
}

/// The full set of fields the engine writes to a mirror record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorDraft {
    /// Title to show.
    pub title: String,
    /// Description to show.
    pub description: String,
    /// Date and display form.
    pub timing: MirrorTiming,
    /// Sync state written atomically with the fields.
    pub metadata: SyncMetadata,
}

impl MirrorDraft {
    /// Fingerprint of the fields this draft writes.
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::compute(self.timing.date(), &self.title)
    }

    /// Whether the observed record already shows exactly this draft.
    pub fn is_applied_to(&self, record: &MirrorRecord) -> bool {
        record.title == self.title
            && record.description == self.description
            && record.timing.as_ref() == Some(&self.timing)
            && record.metadata.as_ref() == Some(&self.metadata)
    }

    /// The record the mirror system would hold after applying this draft.
    pub fn into_record(self, id: MirrorId) -> MirrorRecord {
        MirrorRecord {
            id,
            title: self.title,
            description: self.description,
            timing: Some(self.timing),
            metadata: Some(self.metadata),
        }
    }
}
