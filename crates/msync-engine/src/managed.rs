//! Discovery of managed mirror records.
//!
//! Managed mirrors are found through several listings (by sync tag, by title
//! marker). The listings overlap, so they are merged by mirror id, earlier
//! listings winning. Only records whose id one of the known schemes
//! recognizes are admitted; anything else belongs to someone else and is
//! never touched.

use std::collections::BTreeMap;

use msync_core::identity::{IdScheme, IdentityMapper};
use msync_core::ids::{MirrorId, SourceId};
use msync_core::record::MirrorRecord;

/// A mirror record recognized as managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedMirror {
    /// Scheme that recognized the id.
    pub scheme: IdScheme,
    /// Source record the id was derived from.
    pub source_id: SourceId,
    /// The record as listed.
    pub record: MirrorRecord,
}

/// Managed mirrors keyed by mirror id.
#[derive(Debug, Clone, Default)]
pub struct ManagedMirrorSet {
    entries: BTreeMap<MirrorId, ManagedMirror>,
    foreign: usize,
}

impl ManagedMirrorSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge listings in priority order.
    pub fn from_listings<I>(mapper: &IdentityMapper, listings: I) -> Self
    where
        I: IntoIterator<Item = Vec<MirrorRecord>>,
    {
        let mut set = Self::new();
        for listing in listings {
            for record in listing {
                set.insert(mapper, record);
            }
        }
        set
    }

    /// Admit one record. Returns `false` for foreign ids and duplicates.
    pub fn insert(&mut self, mapper: &IdentityMapper, record: MirrorRecord) -> bool {
        let Some((scheme, source_id)) = mapper.recognize(&record.id) else {
            self.foreign += 1;
            return false;
        };
        if self.entries.contains_key(&record.id) {
            return false;
        }
        self.entries.insert(
            record.id.clone(),
            ManagedMirror {
                scheme,
                source_id,
                record,
            },
        );
        true
    }

    /// Look up a managed mirror.
    pub fn get(&self, id: &MirrorId) -> Option<&ManagedMirror> {
        self.entries.get(id)
    }

    /// Iterate in mirror id order.
    pub fn iter(&self) -> impl Iterator<Item = &ManagedMirror> {
        self.entries.values()
    }

    /// Managed mirror ids.
    pub fn ids(&self) -> impl Iterator<Item = &MirrorId> {
        self.entries.keys()
    }

    /// Number of managed mirrors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no managed mirror was found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Listed records whose ids no scheme recognized.
    pub fn foreign_count(&self) -> usize {
        self.foreign
    }
}
