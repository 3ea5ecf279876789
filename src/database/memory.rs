use crate::{
    database::store::{page_offset, RankingStore, UpsertOutcome},
    error::{RankingError, Result},
    model::structures::{
        ranking_mode::{RankingMode, SortField},
        ranking_record::RankingRecord,
        GroupId, UserId
    }
};
use async_trait::async_trait;
use itertools::Itertools;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, RwLock
    }
};

/// In-process `RankingStore`. Every operation is atomic with respect to a single record.
///
/// Writes for a given user can be made to fail on demand, which is how partial
/// application of a match is exercised in tests.
#[derive(Debug, Default)]
pub struct InMemoryRankingStore {
    records: RwLock<HashMap<(UserId, GroupId), RankingRecord>>,
    failing_writes: Mutex<HashMap<UserId, u32>>,
    writes: AtomicUsize
}

impl InMemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` upserts for `user_id` fail with `PersistenceFailure`
    pub fn fail_writes_for(&self, user_id: UserId, count: u32) {
        if let Ok(mut failing) = self.failing_writes.lock() {
            failing.insert(user_id, count);
        }
    }

    /// Number of successful upserts
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_failure(&self, user_id: UserId) -> Result<()> {
        let mut failing = self.failing_writes.lock().map_err(|_| lock_error())?;

        if let Some(remaining) = failing.get_mut(&user_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RankingError::PersistenceFailure(format!(
                    "Injected write failure for user {}",
                    user_id
                )));
            }
        }

        Ok(())
    }
}

fn lock_error() -> RankingError {
    RankingError::PersistenceFailure("Failed to acquire ranking store lock".to_string())
}

#[async_trait]
impl RankingStore for InMemoryRankingStore {
    async fn get(&self, user_id: UserId, group_id: GroupId) -> Result<Option<RankingRecord>> {
        let records = self.records.read().map_err(|_| lock_error())?;
        Ok(records.get(&(user_id, group_id)).cloned())
    }

    async fn insert_if_absent(&self, record: RankingRecord) -> Result<RankingRecord> {
        let mut records = self.records.write().map_err(|_| lock_error())?;
        let stored = records
            .entry((record.user_id, record.group_id))
            .or_insert(record);

        Ok(stored.clone())
    }

    async fn upsert(&self, record: &RankingRecord) -> Result<UpsertOutcome> {
        self.take_failure(record.user_id)?;

        let mut records = self.records.write().map_err(|_| lock_error())?;
        let key = (record.user_id, record.group_id);

        if let Some(stored) = records.get(&key) {
            if stored.version != record.version {
                return Ok(UpsertOutcome::Conflict);
            }
        }

        let mut written = record.clone();
        written.version += 1;
        records.insert(key, written.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(UpsertOutcome::Written(written))
    }

    async fn count_with_better_value(&self, group_id: GroupId, sort_field: SortField, value: i64) -> Result<u64> {
        let records = self.records.read().map_err(|_| lock_error())?;

        Ok(records
            .values()
            .filter(|r| r.group_id == group_id && r.is_active && r.mode().sort_field() == sort_field)
            .filter(|r| r.sort_value() > value)
            .count() as u64)
    }

    async fn list_by_group(
        &self,
        group_id: GroupId,
        sort_field: SortField,
        page: u32,
        page_size: u32
    ) -> Result<(Vec<RankingRecord>, u64)> {
        let records = self.records.read().map_err(|_| lock_error())?;

        let active = records
            .values()
            .filter(|r| r.group_id == group_id && r.is_active && r.mode().sort_field() == sort_field)
            .sorted_by(|a, b| {
                b.sort_value()
                    .cmp(&a.sort_value())
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .collect_vec();

        let total = active.len() as u64;
        let page_records = active
            .into_iter()
            .skip(page_offset(page, page_size) as usize)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok((page_records, total))
    }

    async fn modes_in_group(&self, group_id: GroupId) -> Result<Vec<RankingMode>> {
        let records = self.records.read().map_err(|_| lock_error())?;

        Ok(records
            .values()
            .filter(|r| r.group_id == group_id)
            .map(|r| r.mode())
            .unique()
            .collect())
    }
}
