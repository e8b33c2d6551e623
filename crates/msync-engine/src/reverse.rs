//! Reverse pass: mirror edits back to source records.
//!
//! A mirror whose observed fingerprint no longer matches the one stored by
//! the last engine write was edited in the mirror system. Each mirror is
//! re-read before the decision and again before the restamp. Its date is pushed
//! to the source record under the source's revision token, then the mirror is
//! restamped as mirror-edited so the forward pass leaves it alone.
//!
//! When both sides moved since the last sync the mirror wins.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use msync_core::error::{SyncError, SyncResult};
use msync_core::fingerprint::ContentHash;
use msync_core::ids::MirrorId;
use msync_core::record::{MirrorRecord, SyncMetadata};
use msync_core::traits::{DateWrite, Lookup, MirrorSystem, SourceSystem};
use msync_core::types::OriginTag;

use crate::engine::ReconciliationEngine;
use crate::managed::{ManagedMirror, ManagedMirrorSet};
use crate::statistics::{RecordAction, StatisticsTracker};

/// A mirror-side edit awaiting propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEdit {
    /// Date the mirror now shows.
    pub date: NaiveDate,
    /// Fingerprint of the mirror as observed.
    pub observed_hash: ContentHash,
}

/// Decisions of the reverse pass that need no I/O.
pub struct ConflictResolver;

impl ConflictResolver {
    /// The pending edit on `mirror`, or `None` if it matches its stored fingerprint.
    ///
    /// A missing stored fingerprint counts as an edit.
    ///
    /// # Errors
    ///
    /// A mirror showing no date cannot be pushed anywhere and is invalid.
    pub fn detect_edit(mirror: &MirrorRecord) -> SyncResult<Option<MirrorEdit>> {
        let date = mirror
            .observed_date()
            .ok_or_else(|| SyncError::validation(mirror.id.as_str(), "mirror record has no date"))?;
        let observed_hash = ContentHash::compute(date, &mirror.title);

        if mirror.stored_hash() == Some(&observed_hash) {
            return Ok(None);
        }
        Ok(Some(MirrorEdit {
            date,
            observed_hash,
        }))
    }

    /// Whether the source moved away from what the engine last wrote, too.
    ///
    /// The stored fingerprint covers the date and title of the last engine
    /// write. `synced_title` is the title the engine renders for the source,
    /// so a title edited in the mirror does not count as a source change.
    #[must_use]
    pub fn is_double_edit(
        mirror: &MirrorRecord,
        source_date: Option<NaiveDate>,
        synced_title: &str,
    ) -> bool {
        match (mirror.stored_hash(), source_date) {
            (Some(stored), Some(date)) => *stored != ContentHash::compute(date, synced_title),
            _ => false,
        }
    }
}

impl<S, M> ReconciliationEngine<S, M>
where
    S: SourceSystem,
    M: MirrorSystem,
{
    /// Reconcile every managed mirror, `max_concurrency` at a time.
    pub(crate) async fn reverse_pass(&self, managed: &ManagedMirrorSet, tracker: &StatisticsTracker) {
        tracker.add_total(managed.len());
        stream::iter(managed.iter())
            .for_each_concurrent(self.config.max_concurrency, move |entry| {
                self.reverse_one(entry, tracker)
            })
            .await;
    }

    async fn reverse_one(&self, entry: &ManagedMirror, tracker: &StatisticsTracker) {
        match self.reverse_record(entry, tracker).await {
            Ok(action) => tracker.record(action),
            Err(e) if e.is_conflict() => {
                warn!(
                    source_id = %entry.source_id,
                    mirror_id = %entry.record.id,
                    "Source record changed concurrently, mirror edit deferred to next cycle"
                );
                tracker.record_failure(&e);
            }
            Err(e) => {
                warn!(
                    source_id = %entry.source_id,
                    mirror_id = %entry.record.id,
                    error = %e,
                    error_code = e.error_code(),
                    "Reverse sync failed for record"
                );
                tracker.record_failure(&e);
            }
        }
    }

    async fn reverse_record(
        &self,
        entry: &ManagedMirror,
        tracker: &StatisticsTracker,
    ) -> SyncResult<RecordAction> {
        let source_id = &entry.source_id;

        // The listing may be stale by now; decide on a fresh read.
        let Some(fresh) = self.reread_mirror(&entry.record.id).await? else {
            debug!(mirror_id = %entry.record.id, "Mirror record gone before reverse sync");
            return Ok(RecordAction::AlreadyAbsent);
        };
        let mirror = &fresh;

        let Some(edit) = ConflictResolver::detect_edit(mirror)? else {
            return Ok(RecordAction::InSync);
        };

        // Read immediately before the write so the revision token is fresh.
        let source = match self
            .calls
            .run("get source record", self.source.get_record(source_id))
            .await?
        {
            Lookup::Found(source) => source,
            Lookup::NotFound => {
                debug!(source_id = %source_id, "Source record gone, mirror left to collection");
                return Ok(RecordAction::SourceMissing);
            }
        };

        if !source.is_active {
            debug!(source_id = %source_id, "Source record inactive, mirror edit not pushed");
            return Ok(RecordAction::SourceInactive);
        }

        let source_date = source.effective_date();
        if source_date == Some(edit.date) {
            debug!(source_id = %source_id, date = %edit.date, "Source already shows mirror date");
            return Ok(RecordAction::Consistent);
        }

        let synced_title = self.renderer.title(&source);
        if ConflictResolver::is_double_edit(mirror, source_date, &synced_title) {
            warn!(
                source_id = %source_id,
                mirror_id = %mirror.id,
                mirror_date = %edit.date,
                source_date = ?source_date,
                "Both sides changed since last sync, mirror edit wins"
            );
            tracker.mark(RecordAction::DoubleEdit);
        }

        let write = self
            .calls
            .run(
                "write source date",
                self.source
                    .write_record_date(source_id, &source.revision_token, edit.date),
            )
            .await?;

        match write {
            DateWrite::Written => {}
            DateWrite::Conflict { stale_token } => {
                debug!(source_id = %source_id, stale_token = %stale_token, "Revision token rejected");
                return Err(SyncError::conflict(source_id.clone()));
            }
            DateWrite::NotFound => {
                debug!(source_id = %source_id, "Source record vanished before write");
                return Ok(RecordAction::SourceMissing);
            }
        }

        info!(
            source_id = %source_id,
            mirror_id = %mirror.id,
            date = %edit.date,
            "Mirror edit pushed to source"
        );

        // Restamp only the state that was pushed. A mirror edited again since
        // keeps its stale stamp and is picked up next cycle.
        let current = match self.reread_mirror(&mirror.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                debug!(mirror_id = %mirror.id, "Mirror deleted before metadata refresh");
                return Ok(RecordAction::PushedToSource);
            }
            Err(e) => {
                warn!(
                    mirror_id = %mirror.id,
                    error = %e,
                    "Mirror re-read failed after source write, metadata left stale"
                );
                tracker.mark(RecordAction::MetadataStale);
                return Ok(RecordAction::PushedToSource);
            }
        };
        if current.observed_hash().as_ref() != Some(&edit.observed_hash) {
            warn!(
                mirror_id = %mirror.id,
                pushed_date = %edit.date,
                "Mirror edited again during reverse sync, metadata refresh skipped"
            );
            tracker.mark(RecordAction::MetadataStale);
            return Ok(RecordAction::PushedToSource);
        }

        let metadata = SyncMetadata {
            origin: OriginTag::MirrorEdited,
            content_hash: edit.observed_hash,
            source_id: source_id.clone(),
        };
        if let Some(draft) = current.restamped(metadata) {
            let restamp = self
                .calls
                .run(
                    "update mirror metadata",
                    self.mirror.update_record(&mirror.id, &draft),
                )
                .await;
            match restamp {
                Ok(Lookup::Found(())) => {}
                Ok(Lookup::NotFound) => {
                    debug!(mirror_id = %mirror.id, "Mirror deleted before metadata refresh");
                }
                Err(e) => {
                    // The source write stands; the next cycles see equal dates
                    // and the forward pass rewrites the metadata.
                    warn!(
                        mirror_id = %mirror.id,
                        error = %e,
                        "Mirror metadata refresh failed after source write"
                    );
                    tracker.mark(RecordAction::MetadataStale);
                }
            }
        }

        Ok(RecordAction::PushedToSource)
    }

    async fn reread_mirror(&self, id: &MirrorId) -> SyncResult<Option<MirrorRecord>> {
        let lookup = self
            .calls
            .run("get mirror record", self.mirror.get_record(id))
            .await?;
        Ok(lookup.found())
    }
}
