//! Collaborator traits
//!
//! The engine talks to both remote systems only through these traits. HTTP
//! clients, credentials and webhook verification live behind them.
//!
//! Reads return `SyncResult<Lookup<T>>`, a three-way result: `Ok(Found)`,
//! `Ok(NotFound)` or `Err(reason)`. The three cases drive different branches
//! (create, skip, retry next cycle), so "not found" is never folded into the
//! error type.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::SyncResult;
use crate::ids::{MirrorId, RevisionToken, SourceId};
use crate::record::{MirrorDraft, MirrorRecord, SourceRecord};
use crate::types::{CategoryFilter, MirrorFilter};

/// Outcome of a lookup by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The record exists.
    Found(T),
    /// The record does not exist. Expected, not an error.
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert into an `Option`.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    /// Check if the record exists.
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}

/// Outcome of writing a date to the source system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateWrite {
    /// The date was written.
    Written,
    /// The revision token was stale; someone else edited the record.
    Conflict { stale_token: RevisionToken },
    /// The record no longer exists.
    NotFound,
}

/// Outcome of a mirror upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new record was created under the given id.
    Created,
    /// An existing record was overwritten.
    Updated,
}

/// Outcome of a mirror delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record was deleted.
    Deleted,
    /// The record was already gone. Treated as success.
    AlreadyAbsent,
}

/// The authoritative system.
#[async_trait]
pub trait SourceSystem: Send + Sync {
    /// Display name used in logs.
    fn display_name(&self) -> &str;

    /// List all active records the filter selects.
    ///
    /// Implementations may ignore the filter; the engine re-applies it.
    async fn list_active_records(&self, filter: &CategoryFilter) -> SyncResult<Vec<SourceRecord>>;

    /// Fetch one record, including its current revision token.
    async fn get_record(&self, id: &SourceId) -> SyncResult<Lookup<SourceRecord>>;

    /// Write a new date, guarded by the revision token.
    async fn write_record_date(
        &self,
        id: &SourceId,
        revision_token: &RevisionToken,
        date: NaiveDate,
    ) -> SyncResult<DateWrite>;
}

/// The secondary (mirror) system.
#[async_trait]
pub trait MirrorSystem: Send + Sync {
    /// Display name used in logs.
    fn display_name(&self) -> &str;

    /// Fetch one record by id.
    async fn get_record(&self, id: &MirrorId) -> SyncResult<Lookup<MirrorRecord>>;

    /// List records matching the filter.
    async fn list_records(&self, filter: &MirrorFilter) -> SyncResult<Vec<MirrorRecord>>;

    /// Overwrite an existing record. `NotFound` if there is none.
    async fn update_record(&self, id: &MirrorId, draft: &MirrorDraft) -> SyncResult<Lookup<()>>;

    /// Create a record under a caller-chosen id.
    async fn create_record(&self, id: &MirrorId, draft: &MirrorDraft) -> SyncResult<()>;

    /// Delete a record.
    async fn delete_record(&self, id: &MirrorId) -> SyncResult<DeleteOutcome>;

    /// Update by id, creating under the same id if the mirror reports it missing.
    ///
    /// Fields and metadata travel in one write, so a record never carries
    /// new fields with old metadata or the reverse.
    async fn upsert_record(&self, id: &MirrorId, draft: &MirrorDraft) -> SyncResult<UpsertOutcome> {
        match self.update_record(id, draft).await? {
            Lookup::Found(()) => Ok(UpsertOutcome::Updated),
            Lookup::NotFound => {
                self.create_record(id, draft).await?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}
