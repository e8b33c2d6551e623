//! Garbage collection of orphaned mirrors.
//!
//! A managed mirror is an orphan when no active source record derives its id
//! under the current scheme. That covers mirrors of closed or deleted records
//! and mirrors left behind under an older id scheme.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use msync_core::error::SyncResult;
use msync_core::identity::IdentityMapper;
use msync_core::ids::MirrorId;
use msync_core::record::SourceRecord;
use msync_core::traits::{DeleteOutcome, MirrorSystem, SourceSystem};

use crate::engine::ReconciliationEngine;
use crate::managed::ManagedMirrorSet;
use crate::statistics::{RecordAction, StatisticsTracker};

/// Computes which managed mirrors to delete.
pub struct GarbageCollector;

impl GarbageCollector {
    /// Managed mirror ids minus the ids the active records derive to.
    ///
    /// Active records without a usable date still protect their mirror.
    #[must_use]
    pub fn plan(
        mapper: &IdentityMapper,
        active: &[SourceRecord],
        managed: &ManagedMirrorSet,
    ) -> Vec<MirrorId> {
        let expected: HashSet<MirrorId> = active
            .iter()
            .filter_map(|record| mapper.derive_mirror_id(&record.id).ok())
            .collect();

        managed
            .ids()
            .filter(|id| !expected.contains(*id))
            .cloned()
            .collect()
    }
}

impl<S, M> ReconciliationEngine<S, M>
where
    S: SourceSystem,
    M: MirrorSystem,
{
    /// Discover managed mirrors and delete the orphans.
    ///
    /// # Errors
    ///
    /// Fails when the mirror records cannot be listed. Individual delete
    /// failures are counted and retried next cycle.
    pub(crate) async fn garbage_collect(
        &self,
        active: &[SourceRecord],
        tracker: &StatisticsTracker,
    ) -> SyncResult<()> {
        let managed = self.discover_managed().await?;
        let orphans = GarbageCollector::plan(&self.mapper, active, &managed);
        debug!(
            managed = managed.len(),
            orphans = orphans.len(),
            "Garbage collection planned"
        );

        tracker.add_total(orphans.len());
        stream::iter(&orphans)
            .for_each_concurrent(self.config.max_concurrency, move |id| {
                self.delete_orphan(id, tracker)
            })
            .await;
        Ok(())
    }

    async fn delete_orphan(&self, id: &MirrorId, tracker: &StatisticsTracker) {
        let result = self
            .calls
            .run("delete mirror record", self.mirror.delete_record(id))
            .await;

        match result {
            Ok(DeleteOutcome::Deleted) => {
                info!(mirror_id = %id, "Orphaned mirror record deleted");
                tracker.record(RecordAction::Deleted);
            }
            Ok(DeleteOutcome::AlreadyAbsent) => {
                debug!(mirror_id = %id, "Orphaned mirror record already absent");
                tracker.record(RecordAction::AlreadyAbsent);
            }
            Err(e) => {
                warn!(
                    mirror_id = %id,
                    error = %e,
                    error_code = e.error_code(),
                    "Failed to delete orphaned mirror record"
                );
                tracker.record_failure(&e);
            }
        }
    }
}
