//! Forward pass: source records to mirror records.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use msync_core::error::SyncResult;
use msync_core::record::{MirrorDraft, MirrorRecord, SourceRecord};
use msync_core::traits::{MirrorSystem, SourceSystem, UpsertOutcome};
use msync_core::types::OriginTag;

use crate::engine::ReconciliationEngine;
use crate::statistics::{RecordAction, StatisticsTracker};

/// What the forward pass does with one source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Upsert the rendered draft.
    Write,
    /// The mirror already shows the draft.
    Unchanged,
    /// The mirror carries a date edit the reverse pass has not pushed yet.
    HoldForReverse,
}

impl ForwardDecision {
    /// Decide from the observed mirror (if any) and the rendered draft.
    ///
    /// A mirror whose stored fingerprint does not match its observed fields
    /// (or that has none) was edited outside this engine. Its date is held
    /// only if it differs from the date about to be written; otherwise the
    /// write is harmless and also repairs the stored fingerprint.
    #[must_use]
    pub fn decide(existing: Option<&MirrorRecord>, draft: &MirrorDraft) -> Self {
        let Some(mirror) = existing else {
            return ForwardDecision::Write;
        };
        if draft.is_applied_to(mirror) {
            return ForwardDecision::Unchanged;
        }
        let Some(observed_date) = mirror.observed_date() else {
            return ForwardDecision::Write;
        };

        let diverged = match (mirror.stored_hash(), mirror.observed_hash()) {
            (Some(stored), Some(observed)) => *stored != observed,
            _ => true,
        };

        if diverged && observed_date != draft.timing.date() {
            ForwardDecision::HoldForReverse
        } else {
            ForwardDecision::Write
        }
    }

    /// Whether writing over `existing` completes the handoff of a pushed
    /// mirror edit, turning its origin back to authoritative.
    #[must_use]
    pub fn completes_handoff(existing: Option<&MirrorRecord>) -> bool {
        existing.and_then(MirrorRecord::origin) == Some(OriginTag::MirrorEdited)
    }
}

impl<S, M> ReconciliationEngine<S, M>
where
    S: SourceSystem,
    M: MirrorSystem,
{
    /// Reconcile every record, `max_concurrency` at a time.
    pub(crate) async fn forward_pass(&self, sources: &[SourceRecord], tracker: &StatisticsTracker) {
        tracker.add_total(sources.len());
        stream::iter(sources)
            .for_each_concurrent(self.config.max_concurrency, move |record| {
                self.forward_one(record, tracker)
            })
            .await;
    }

    async fn forward_one(&self, record: &SourceRecord, tracker: &StatisticsTracker) {
        match self.forward_record(record).await {
            Ok(action) => tracker.record(action),
            Err(e) => {
                warn!(
                    source_id = %record.id,
                    error = %e,
                    error_code = e.error_code(),
                    "Forward sync failed for record"
                );
                tracker.record_failure(&e);
            }
        }
    }

    /// Fetch, compare and write one record. Steps run strictly in order.
    async fn forward_record(&self, record: &SourceRecord) -> SyncResult<RecordAction> {
        let date = record.require_date()?;
        let mirror_id = self.mapper.derive_mirror_id(&record.id)?;

        let existing = self
            .calls
            .run("get mirror record", self.mirror.get_record(&mirror_id))
            .await?
            .found();

        let draft = self.renderer.render(record, date, existing.as_ref());

        match ForwardDecision::decide(existing.as_ref(), &draft) {
            ForwardDecision::Unchanged => {
                debug!(source_id = %record.id, mirror_id = %mirror_id, "Mirror up to date");
                Ok(RecordAction::Unchanged)
            }
            ForwardDecision::HoldForReverse => {
                debug!(
                    source_id = %record.id,
                    mirror_id = %mirror_id,
                    origin = ?existing.as_ref().and_then(MirrorRecord::origin),
                    "Mirror edit pending reverse sync, forward write held"
                );
                Ok(RecordAction::PendingMirrorEdit)
            }
            ForwardDecision::Write => {
                let outcome = self
                    .calls
                    .run(
                        "upsert mirror record",
                        self.mirror.upsert_record(&mirror_id, &draft),
                    )
                    .await?;
                let action = match outcome {
                    UpsertOutcome::Created => RecordAction::Created,
                    UpsertOutcome::Updated => RecordAction::Updated,
                };
                info!(
                    source_id = %record.id,
                    mirror_id = %mirror_id,
                    date = %date,
                    action = %action,
                    "Mirror record written"
                );
                if ForwardDecision::completes_handoff(existing.as_ref()) {
                    debug!(
                        source_id = %record.id,
                        mirror_id = %mirror_id,
                        "Pushed mirror edit restamped authoritative"
                    );
                }
                Ok(action)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use msync_core::fingerprint::ContentHash;
    use msync_core::ids::{MirrorId, SourceId};
    use msync_core::record::{MirrorTiming, SyncMetadata};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn draft(day: u32) -> MirrorDraft {
        MirrorDraft {
            title: "🎯 Launch".to_string(),
            description: "\n\nType: Milestone".to_string(),
            timing: MirrorTiming::AllDay { date: date(day) },
            metadata: SyncMetadata {
                origin: OriginTag::Authoritative,
                content_hash: ContentHash::compute(date(day), "🎯 Launch"),
                source_id: SourceId::from(1),
            },
        }
    }

    fn mirror_from(draft: &MirrorDraft) -> MirrorRecord {
        draft.clone().into_record(MirrorId::from("openproject1"))
    }

    #[test]
    fn test_missing_mirror_is_written() {
        assert_eq!(ForwardDecision::decide(None, &draft(10)), ForwardDecision::Write);
    }

    #[test]
    fn test_applied_draft_is_unchanged() {
        let target = draft(10);
        let mirror = mirror_from(&target);
        assert_eq!(
            ForwardDecision::decide(Some(&mirror), &target),
            ForwardDecision::Unchanged
        );
    }

    #[test]
    fn test_source_change_is_written() {
        let mirror = mirror_from(&draft(10));
        assert_eq!(
            ForwardDecision::decide(Some(&mirror), &draft(12)),
            ForwardDecision::Write
        );
    }

    #[test]
    fn test_mirror_date_edit_is_held() {
        let mut mirror = mirror_from(&draft(10));
        mirror.timing = Some(MirrorTiming::AllDay { date: date(15) });
        assert_eq!(
            ForwardDecision::decide(Some(&mirror), &draft(10)),
            ForwardDecision::HoldForReverse
        );
    }

    #[test]
    fn test_mirror_title_edit_is_overwritten() {
        let mut mirror = mirror_from(&draft(10));
        mirror.title = "🎯 Launch (moved?)".to_string();
        assert_eq!(
            ForwardDecision::decide(Some(&mirror), &draft(10)),
            ForwardDecision::Write
        );
    }

    #[test]
    fn test_unknown_hash_with_other_date_is_held() {
        let mut mirror = mirror_from(&draft(10));
        mirror.metadata = None;
        mirror.timing = Some(MirrorTiming::AllDay { date: date(3) });
        assert_eq!(
            ForwardDecision::decide(Some(&mirror), &draft(10)),
            ForwardDecision::HoldForReverse
        );
    }

    #[test]
    fn test_pushed_mirror_edit_is_restamped() {
        // After the reverse pass the source carries the mirror's date and the
        // mirror is tagged as mirror-edited with a matching fingerprint.
        let target = draft(15);
        let mut mirror = mirror_from(&target);
        if let Some(metadata) = mirror.metadata.as_mut() {
            metadata.origin = OriginTag::MirrorEdited;
        }
        assert_eq!(
            ForwardDecision::decide(Some(&mirror), &target),
            ForwardDecision::Write
        );
        assert_eq!(mirror.observed_date(), Some(target.timing.date()));
        assert!(ForwardDecision::completes_handoff(Some(&mirror)));
    }

    #[test]
    fn test_authoritative_mirror_is_no_handoff() {
        let mirror = mirror_from(&draft(10));
        assert!(!ForwardDecision::completes_handoff(Some(&mirror)));
        assert!(!ForwardDecision::completes_handoff(None));
    }
}
