//! In-memory collaborators for engine integration tests.
//!
//! Both fakes behave like the real systems as far as the engine can tell:
//! the source checks revision tokens, the mirror honors its listing filters
//! and reports missing records. Call counters and failure switches let tests
//! observe and break them.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use msync_core::error::{SyncError, SyncResult};
use msync_core::identity::{IdScheme, IdentityMapper};
use msync_core::ids::{MirrorId, RevisionToken, SourceId};
use msync_core::record::{MirrorDraft, MirrorRecord, MirrorTiming, SourceRecord};
use msync_core::traits::{DateWrite, DeleteOutcome, Lookup, MirrorSystem, SourceSystem};
use msync_core::types::{CategoryFilter, MirrorFilter};
use msync_engine::{EngineConfig, ReconciliationEngine};

/// Time a hanging call waits, far beyond any test timeout.
const HANG: Duration = Duration::from_secs(3600);

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An active milestone in project "Apollo".
pub fn milestone(id: u64, title: &str, on: NaiveDate) -> SourceRecord {
    SourceRecord::new(id, title, "Milestone", RevisionToken::from(1))
        .with_date(on)
        .with_project("Apollo")
}

/// Mirror id of a source id under the given scheme.
pub fn mirror_id_under(scheme: IdScheme, id: u64) -> String {
    IdentityMapper::new(scheme)
        .derive_mirror_id(&SourceId::from(id))
        .unwrap()
        .to_string()
}

/// Mirror id of a source id under the default scheme.
pub fn mirror_id(id: u64) -> String {
    mirror_id_under(IdScheme::HexEncoded, id)
}

/// Config with no cooldown and a short call timeout.
pub fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_cooldown(Duration::ZERO)
        .with_call_timeout(Duration::from_secs(5))
}

pub fn engine(
    source: &Arc<FakeSource>,
    mirror: &Arc<FakeMirror>,
    config: EngineConfig,
) -> ReconciliationEngine<FakeSource, FakeMirror> {
    ReconciliationEngine::new(Arc::clone(source), Arc::clone(mirror), config)
}

// =============================================================================
// Source system
// =============================================================================

pub struct FakeSource {
    records: Mutex<BTreeMap<SourceId, SourceRecord>>,
    next_token: AtomicU64,
    list_fails: AtomicBool,
    list_delay: Mutex<Option<Duration>>,
    concurrent_edit_before_write: AtomicBool,
    during_next_write: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            next_token: AtomicU64::new(100),
            list_fails: AtomicBool::new(false),
            list_delay: Mutex::new(None),
            concurrent_edit_before_write: AtomicBool::new(false),
            during_next_write: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = SourceRecord>) -> Self {
        let source = Self::new();
        for record in records {
            source.insert(record);
        }
        source
    }

    pub fn insert(&self, mut record: SourceRecord) {
        record.revision_token = self.fresh_token();
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn record(&self, id: u64) -> Option<SourceRecord> {
        self.records.lock().unwrap().get(&SourceId::from(id)).cloned()
    }

    pub fn date_of(&self, id: u64) -> Option<NaiveDate> {
        self.record(id).and_then(|r| r.effective_date())
    }

    /// Simulate an edit in the source system.
    pub fn set_date(&self, id: u64, on: NaiveDate) {
        let token = self.fresh_token();
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&SourceId::from(id)).unwrap();
        record.date = Some(on);
        record.revision_token = token;
    }

    pub fn close(&self, id: u64) {
        let token = self.fresh_token();
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&SourceId::from(id)).unwrap();
        record.is_active = false;
        record.revision_token = token;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.list_fails.store(fail, Ordering::SeqCst);
    }

    pub fn delay_listing(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    /// Make the next date write lose a race with another editor.
    pub fn edit_concurrently_before_next_write(&self) {
        self.concurrent_edit_before_write.store(true, Ordering::SeqCst);
    }

    /// Run `action` while the next date write is in flight.
    pub fn during_next_write(&self, action: impl FnOnce() + Send + 'static) {
        *self.during_next_write.lock().unwrap() = Some(Box::new(action));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn fresh_token(&self) -> RevisionToken {
        RevisionToken::from(self.next_token.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl SourceSystem for FakeSource {
    fn display_name(&self) -> &str {
        "fake-source"
    }

    async fn list_active_records(&self, _filter: &CategoryFilter) -> SyncResult<Vec<SourceRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(SyncError::transient("list source records", "connection refused"));
        }
        // Like the real system, the category filter is left to the caller.
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn get_record(&self, id: &SourceId) -> SyncResult<Lookup<SourceRecord>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().unwrap().get(id).cloned().into())
    }

    async fn write_record_date(
        &self,
        id: &SourceId,
        revision_token: &RevisionToken,
        on: NaiveDate,
    ) -> SyncResult<DateWrite> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let during = self.during_next_write.lock().unwrap().take();
        if let Some(action) = during {
            action();
        }
        let racing_token = self
            .concurrent_edit_before_write
            .swap(false, Ordering::SeqCst)
            .then(|| self.fresh_token());
        let fresh = self.fresh_token();

        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(id) else {
            return Ok(DateWrite::NotFound);
        };
        if let Some(token) = racing_token {
            record.revision_token = token;
        }
        if &record.revision_token != revision_token {
            return Ok(DateWrite::Conflict {
                stale_token: revision_token.clone(),
            });
        }
        record.date = Some(on);
        record.revision_token = fresh;
        Ok(DateWrite::Written)
    }
}

// =============================================================================
// Mirror system
// =============================================================================

pub struct FakeMirror {
    records: Mutex<BTreeMap<MirrorId, MirrorRecord>>,
    failing_ids: Mutex<HashSet<MirrorId>>,
    hanging_ids: Mutex<HashSet<MirrorId>>,
    list_fails: AtomicBool,
    updates_fail: AtomicBool,
    edit_after_listing: Mutex<Option<(String, NaiveDate)>>,
    get_calls: AtomicUsize,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeMirror {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            failing_ids: Mutex::new(HashSet::new()),
            hanging_ids: Mutex::new(HashSet::new()),
            list_fails: AtomicBool::new(false),
            updates_fail: AtomicBool::new(false),
            edit_after_listing: Mutex::new(None),
            get_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, record: MirrorRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<MirrorRecord> {
        self.records.lock().unwrap().get(&MirrorId::from(id)).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn date_of(&self, id: &str) -> Option<NaiveDate> {
        self.get(id).and_then(|r| r.observed_date())
    }

    /// Simulate a user moving the record in the mirror system.
    pub fn move_to(&self, id: &str, on: NaiveDate) {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&MirrorId::from(id)).unwrap();
        let timing = record.timing.as_ref().unwrap().moved_to(on);
        record.timing = Some(timing);
    }

    pub fn set_timing(&self, id: &str, timing: MirrorTiming) {
        let mut records = self.records.lock().unwrap();
        records.get_mut(&MirrorId::from(id)).unwrap().timing = Some(timing);
    }

    pub fn rename(&self, id: &str, title: &str) {
        let mut records = self.records.lock().unwrap();
        records.get_mut(&MirrorId::from(id)).unwrap().title = title.to_string();
    }

    pub fn strip_metadata(&self, id: &str) {
        let mut records = self.records.lock().unwrap();
        records.get_mut(&MirrorId::from(id)).unwrap().metadata = None;
    }

    pub fn fail_id(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(MirrorId::from(id));
    }

    pub fn hang_id(&self, id: &str) {
        self.hanging_ids.lock().unwrap().insert(MirrorId::from(id));
    }

    pub fn fail_listing(&self, fail: bool) {
        self.list_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.updates_fail.store(fail, Ordering::SeqCst);
    }

    /// Move `id` to `on` right after the next listing has been taken.
    pub fn edit_after_next_listing(&self, id: &str, on: NaiveDate) {
        *self.edit_after_listing.lock().unwrap() = Some((id.to_string(), on));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Every mutating call, successful or not.
    pub fn write_calls(&self) -> usize {
        self.create_calls() + self.update_calls() + self.delete_calls()
    }

    async fn check_reachable(&self, id: &MirrorId, operation: &str) -> SyncResult<()> {
        let hangs = self.hanging_ids.lock().unwrap().contains(id);
        if hangs {
            tokio::time::sleep(HANG).await;
        }
        if self.failing_ids.lock().unwrap().contains(id) {
            return Err(SyncError::transient(operation, "503 backend error"));
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorSystem for FakeMirror {
    fn display_name(&self) -> &str {
        "fake-mirror"
    }

    async fn get_record(&self, id: &MirrorId) -> SyncResult<Lookup<MirrorRecord>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(id, "get mirror record").await?;
        Ok(self.records.lock().unwrap().get(id).cloned().into())
    }

    async fn list_records(&self, filter: &MirrorFilter) -> SyncResult<Vec<MirrorRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(SyncError::transient("list mirror records", "rate limited"));
        }
        let listed: Vec<MirrorRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| match filter {
                MirrorFilter::ManagedTag => record.metadata.is_some(),
                MirrorFilter::TitleMarker(marker) => record.title.contains(marker.as_str()),
            })
            .cloned()
            .collect();

        let pending = self.edit_after_listing.lock().unwrap().take();
        if let Some((id, on)) = pending {
            self.move_to(&id, on);
        }
        Ok(listed)
    }

    async fn update_record(&self, id: &MirrorId, draft: &MirrorDraft) -> SyncResult<Lookup<()>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(id, "update mirror record").await?;
        if self.updates_fail.load(Ordering::SeqCst) {
            return Err(SyncError::transient("update mirror record", "503 backend error"));
        }
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(id) {
            return Ok(Lookup::NotFound);
        }
        records.insert(id.clone(), draft.clone().into_record(id.clone()));
        Ok(Lookup::Found(()))
    }

    async fn create_record(&self, id: &MirrorId, draft: &MirrorDraft) -> SyncResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(id, "create mirror record").await?;
        let mut records = self.records.lock().unwrap();
        if records.contains_key(id) {
            return Err(SyncError::CreateRefused {
                mirror_id: id.clone(),
                message: "identifier already exists".to_string(),
            });
        }
        records.insert(id.clone(), draft.clone().into_record(id.clone()));
        Ok(())
    }

    async fn delete_record(&self, id: &MirrorId) -> SyncResult<DeleteOutcome> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(id, "delete mirror record").await?;
        match self.records.lock().unwrap().remove(id) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::AlreadyAbsent),
        }
    }
}
