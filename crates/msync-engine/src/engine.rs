//! Reconciliation engine.
//!
//! Owns the two collaborators and runs passes over them. The per-direction
//! logic lives in [`crate::forward`], [`crate::reverse`] and [`crate::gc`];
//! this module holds the shared plumbing: listing, time bounds and reports.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use msync_core::error::SyncResult;
use msync_core::identity::IdentityMapper;
use msync_core::record::SourceRecord;
use msync_core::traits::{MirrorSystem, SourceSystem};
use msync_core::types::Direction;

use crate::config::EngineConfig;
use crate::managed::ManagedMirrorSet;
use crate::render::MirrorRenderer;
use crate::report::{PassReport, PassStatus};
use crate::resilience::CallTimeout;
use crate::statistics::{RecordAction, StatisticsTracker};

/// Reconciles source records and their mirrors.
///
/// The engine itself holds no sync state between passes; everything it needs
/// is read back from the mirror records' metadata. Callers that run passes
/// concurrently must serialize them (see [`crate::coordinator::SyncCoordinator`]).
pub struct ReconciliationEngine<S, M> {
    pub(crate) source: Arc<S>,
    pub(crate) mirror: Arc<M>,
    pub(crate) config: EngineConfig,
    pub(crate) mapper: IdentityMapper,
    pub(crate) renderer: MirrorRenderer,
    pub(crate) calls: CallTimeout,
}

impl<S, M> ReconciliationEngine<S, M>
where
    S: SourceSystem,
    M: MirrorSystem,
{
    /// Create a new engine.
    #[must_use]
    pub fn new(source: Arc<S>, mirror: Arc<M>, config: EngineConfig) -> Self {
        Self {
            mapper: IdentityMapper::new(config.id_scheme),
            renderer: MirrorRenderer::new(&config),
            calls: CallTimeout::new(config.call_timeout),
            source,
            mirror,
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Identity mapper deriving ids under the configured scheme.
    pub fn mapper(&self) -> &IdentityMapper {
        &self.mapper
    }

    /// Renderer producing mirror drafts.
    pub fn renderer(&self) -> &MirrorRenderer {
        &self.renderer
    }

    /// Run one pass in the given direction.
    ///
    /// Forward runs also collect garbage.
    pub async fn run(&self, direction: Direction) -> SyncResult<PassReport> {
        match direction {
            Direction::Forward => self.run_forward().await,
            Direction::Reverse => self.run_reverse().await,
        }
    }

    /// Forward pass over all eligible source records, then garbage collection.
    ///
    /// # Errors
    ///
    /// Fails only when the source records cannot be listed. Per-record
    /// failures are counted in the report.
    pub async fn run_forward(&self) -> SyncResult<PassReport> {
        self.forward_cycle(Uuid::new_v4()).await
    }

    /// Reverse pass over all managed mirror records.
    ///
    /// # Errors
    ///
    /// Fails only when the mirror records cannot be listed.
    pub async fn run_reverse(&self) -> SyncResult<PassReport> {
        self.reverse_cycle(Uuid::new_v4()).await
    }

    /// Garbage collection alone, against an already fetched active set.
    ///
    /// # Errors
    ///
    /// Fails when the mirror records cannot be listed.
    pub async fn collect_garbage(&self, active: &[SourceRecord]) -> SyncResult<PassReport> {
        self.garbage_cycle(Uuid::new_v4(), active).await
    }

    #[instrument(skip(self), fields(run_id = %run_id, direction = "forward"))]
    async fn forward_cycle(&self, run_id: Uuid) -> SyncResult<PassReport> {
        let started_at = Utc::now();
        let tracker = StatisticsTracker::new();
        info!(
            source = self.source.display_name(),
            mirror = self.mirror.display_name(),
            "Forward pass started"
        );

        let sources = match self.list_eligible_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                error!(error = %e, error_code = e.error_code(), "Forward pass aborted");
                return Err(e);
            }
        };

        self.forward_pass(&sources, &tracker).await;

        let status = match self.garbage_collect(&sources, &tracker).await {
            Ok(()) => PassStatus::Completed,
            Err(e) => {
                error!(error = %e, error_code = e.error_code(), "Garbage collection aborted");
                PassStatus::Incomplete {
                    reason: format!("garbage collection: {e}"),
                }
            }
        };

        Ok(self.finish(run_id, Direction::Forward, status, started_at, &tracker))
    }

    #[instrument(skip(self), fields(run_id = %run_id, direction = "reverse"))]
    async fn reverse_cycle(&self, run_id: Uuid) -> SyncResult<PassReport> {
        let started_at = Utc::now();
        let tracker = StatisticsTracker::new();
        info!(
            source = self.source.display_name(),
            mirror = self.mirror.display_name(),
            "Reverse pass started"
        );

        let managed = match self.discover_managed().await {
            Ok(managed) => managed,
            Err(e) => {
                error!(error = %e, error_code = e.error_code(), "Reverse pass aborted");
                return Err(e);
            }
        };

        self.reverse_pass(&managed, &tracker).await;

        Ok(self.finish(
            run_id,
            Direction::Reverse,
            PassStatus::Completed,
            started_at,
            &tracker,
        ))
    }

    #[instrument(skip(self, active), fields(run_id = %run_id, direction = "forward"))]
    async fn garbage_cycle(&self, run_id: Uuid, active: &[SourceRecord]) -> SyncResult<PassReport> {
        let started_at = Utc::now();
        let tracker = StatisticsTracker::new();
        if let Err(e) = self.garbage_collect(active, &tracker).await {
            error!(error = %e, error_code = e.error_code(), "Garbage collection aborted");
            return Err(e);
        }
        Ok(self.finish(
            run_id,
            Direction::Forward,
            PassStatus::Completed,
            started_at,
            &tracker,
        ))
    }

    /// Active source records in the configured category.
    ///
    /// The filter is re-applied locally; collaborators may return more.
    pub(crate) async fn list_eligible_sources(&self) -> SyncResult<Vec<SourceRecord>> {
        let listed = self
            .calls
            .run(
                "list source records",
                self.source.list_active_records(&self.config.category),
            )
            .await?;
        let total = listed.len();

        let eligible: Vec<SourceRecord> = listed
            .into_iter()
            .filter(|record| record.is_active && self.config.category.matches(&record.category))
            .collect();

        debug!(
            listed = total,
            eligible = eligible.len(),
            category = %self.config.category,
            "Listed source records"
        );
        Ok(eligible)
    }

    /// Managed mirrors across every configured listing.
    pub(crate) async fn discover_managed(&self) -> SyncResult<ManagedMirrorSet> {
        let mut listings = Vec::new();
        for filter in self.config.mirror_filters() {
            let records = self
                .calls
                .run("list mirror records", self.mirror.list_records(&filter))
                .await?;
            debug!(filter = %filter, count = records.len(), "Listed mirror records");
            listings.push(records);
        }

        let managed = ManagedMirrorSet::from_listings(&self.mapper, listings);
        debug!(
            managed = managed.len(),
            foreign = managed.foreign_count(),
            "Merged mirror listings"
        );
        Ok(managed)
    }

    fn finish(
        &self,
        run_id: Uuid,
        direction: Direction,
        status: PassStatus,
        started_at: DateTime<Utc>,
        tracker: &StatisticsTracker,
    ) -> PassReport {
        let statistics = tracker.snapshot();
        info!(
            processed = statistics.records_processed,
            writes = statistics.writes(),
            failed = statistics.action_count(RecordAction::Failed),
            conflicts = statistics.action_count(RecordAction::Conflict),
            duration_ms = statistics.duration_ms,
            completed = status.is_completed(),
            "{} pass finished",
            direction
        );

        PassReport {
            run_id,
            direction,
            status,
            started_at,
            completed_at: Utc::now(),
            statistics,
        }
    }
}
