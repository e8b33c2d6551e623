//! Pass statistics tracking.
//!
//! Every record a pass looks at ends in exactly one [`RecordAction`]. Markers
//! such as [`RecordAction::DoubleEdit`] are counted on top of that outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use msync_core::error::{ErrorKind, SyncError};

/// What a pass did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    /// Mirror created.
    Created,
    /// Mirror overwritten.
    Updated,
    /// Mirror already showed the rendered draft; nothing written.
    Unchanged,
    /// Forward write held back: the mirror carries an edit not yet pushed back.
    PendingMirrorEdit,
    /// Reverse pass: observed fingerprint matches the stored one.
    InSync,
    /// Reverse pass: source already shows the mirror's date.
    Consistent,
    /// Mirror date written to the source record.
    PushedToSource,
    /// Source record no longer exists.
    SourceMissing,
    /// Source record is closed.
    SourceInactive,
    /// Source revision token went stale between read and write.
    Conflict,
    /// Record cannot be processed as it stands (no date, underivable id).
    Invalid,
    /// Orphaned mirror deleted.
    Deleted,
    /// Orphaned mirror was already gone.
    AlreadyAbsent,
    /// Transient or permanent failure; retried next cycle.
    Failed,
    /// Marker: both sides changed since the last sync; the mirror won.
    DoubleEdit,
    /// Marker: source written but the mirror metadata refresh failed.
    MetadataStale,
}

impl RecordAction {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordAction::Created => "created",
            RecordAction::Updated => "updated",
            RecordAction::Unchanged => "unchanged",
            RecordAction::PendingMirrorEdit => "pending_mirror_edit",
            RecordAction::InSync => "in_sync",
            RecordAction::Consistent => "consistent",
            RecordAction::PushedToSource => "pushed_to_source",
            RecordAction::SourceMissing => "source_missing",
            RecordAction::SourceInactive => "source_inactive",
            RecordAction::Conflict => "conflict",
            RecordAction::Invalid => "invalid",
            RecordAction::Deleted => "deleted",
            RecordAction::AlreadyAbsent => "already_absent",
            RecordAction::Failed => "failed",
            RecordAction::DoubleEdit => "double_edit",
            RecordAction::MetadataStale => "metadata_stale",
        }
    }

    /// Whether this outcome wrote to either system.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            RecordAction::Created
                | RecordAction::Updated
                | RecordAction::PushedToSource
                | RecordAction::Deleted
        )
    }

    /// Outcome for a record whose processing failed with `error`.
    #[must_use]
    pub fn for_error(error: &SyncError) -> Self {
        match error.kind() {
            ErrorKind::ConcurrencyConflict => RecordAction::Conflict,
            ErrorKind::PermanentValidation => RecordAction::Invalid,
            ErrorKind::TransientIo | ErrorKind::Permanent => RecordAction::Failed,
        }
    }
}

impl fmt::Display for RecordAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStatistics {
    /// Records the pass set out to process.
    #[serde(default)]
    pub records_total: u32,
    /// Records processed so far.
    #[serde(default)]
    pub records_processed: u32,
    /// Outcomes broken down by action.
    #[serde(default)]
    pub actions: HashMap<String, u32>,
    /// Failures broken down by error kind.
    #[serde(default)]
    pub failures_by_kind: HashMap<String, u32>,
    /// Total duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl PassStatistics {
    /// Get count for a specific action.
    #[must_use]
    pub fn action_count(&self, action: RecordAction) -> u32 {
        self.actions.get(action.as_str()).copied().unwrap_or(0)
    }

    /// Get count of failures of a specific kind.
    #[must_use]
    pub fn failure_count(&self, kind: ErrorKind) -> u32 {
        self.failures_by_kind
            .get(&kind.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Number of writes to either system.
    #[must_use]
    pub fn writes(&self) -> u32 {
        [
            RecordAction::Created,
            RecordAction::Updated,
            RecordAction::PushedToSource,
            RecordAction::Deleted,
        ]
        .into_iter()
        .map(|action| self.action_count(action))
        .sum()
    }

    /// Merge with another statistics instance.
    pub fn merge(&mut self, other: &PassStatistics) {
        self.records_total += other.records_total;
        self.records_processed += other.records_processed;
        self.duration_ms += other.duration_ms;

        for (key, value) in &other.actions {
            *self.actions.entry(key.clone()).or_insert(0) += value;
        }

        for (key, value) in &other.failures_by_kind {
            *self.failures_by_kind.entry(key.clone()).or_insert(0) += value;
        }
    }
}

/// Thread-safe tracker for accumulating statistics during a pass.
pub struct StatisticsTracker {
    records_total: AtomicU32,
    records_processed: AtomicU32,
    actions: RwLock<HashMap<RecordAction, u32>>,
    failures_by_kind: RwLock<HashMap<ErrorKind, u32>>,
    start_time: Instant,
}

impl StatisticsTracker {
    /// Create a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records_total: AtomicU32::new(0),
            records_processed: AtomicU32::new(0),
            actions: RwLock::new(HashMap::new()),
            failures_by_kind: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Add to the number of records the pass sets out to process.
    pub fn add_total(&self, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.records_total.fetch_add(count, Ordering::SeqCst);
    }

    /// Record the outcome for one processed record.
    pub fn record(&self, action: RecordAction) {
        self.records_processed.fetch_add(1, Ordering::SeqCst);
        self.mark(action);
    }

    /// Count a marker without counting another processed record.
    pub fn mark(&self, action: RecordAction) {
        if let Ok(mut map) = self.actions.write() {
            *map.entry(action).or_insert(0) += 1;
        }
    }

    /// Record a failed record.
    pub fn record_failure(&self, error: &SyncError) {
        self.record(RecordAction::for_error(error));
        if let Ok(mut map) = self.failures_by_kind.write() {
            *map.entry(error.kind()).or_insert(0) += 1;
        }
    }

    /// Snapshot current statistics.
    pub fn snapshot(&self) -> PassStatistics {
        let actions = self
            .actions
            .read()
            .map(|map| map.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        let failures_by_kind = self
            .failures_by_kind
            .read()
            .map(|map| map.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        PassStatistics {
            records_total: self.records_total.load(Ordering::SeqCst),
            records_processed: self.records_processed.load(Ordering::SeqCst),
            actions,
            failures_by_kind,
            duration_ms: u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}
