use crate::{
    error::{RankingError, Result},
    model::structures::{
        ranking_mode::{RankingMode, SortField},
        ranking_record::{RankingRecord, RatingState},
        GroupId, MatchId, UserId
    }
};
use async_trait::async_trait;

/// Result of a version-checked write
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// Stored. Carries the record with its new version.
    Written(RankingRecord),
    /// Someone else wrote the record since it was read. Re-read and try again.
    Conflict
}

/// Durable storage for ranking records, keyed by (user, group).
///
/// The store is the only thing allowed to mutate a record. Every method is a
/// potential suspension point; callers hold no locks across them.
#[async_trait]
pub trait RankingStore: Send + Sync {
    async fn get(&self, user_id: UserId, group_id: GroupId) -> Result<Option<RankingRecord>>;

    /// Atomically inserts the record unless one exists for its (user, group) pair.
    /// Returns whichever record is stored afterwards, or `AlreadyExists` when the
    /// insert lost to a record that could not be read back yet.
    async fn insert_if_absent(&self, record: RankingRecord) -> Result<RankingRecord>;

    /// Writes the record's aggregate state and its newest history entry, provided
    /// the stored version still equals `record.version`. Inserts the record if
    /// nothing is stored for it yet. A history entry for a match already recorded
    /// on this ranking is never stored twice.
    async fn upsert(&self, record: &RankingRecord) -> Result<UpsertOutcome>;

    /// Active records in the group whose sort value is strictly greater than `value`
    async fn count_with_better_value(&self, group_id: GroupId, sort_field: SortField, value: i64) -> Result<u64>;

    /// One page (1-based) of active records sorted by `sort_field` descending,
    /// plus the total number of active records in the group
    async fn list_by_group(
        &self,
        group_id: GroupId,
        sort_field: SortField,
        page: u32,
        page_size: u32
    ) -> Result<(Vec<RankingRecord>, u64)>;

    /// Distinct modes of all records (active or not) in the group
    async fn modes_in_group(&self, group_id: GroupId) -> Result<Vec<RankingMode>>;
}

/// Zero-based offset of a 1-based page
pub fn page_offset(page: u32, page_size: u32) -> u64 {
    (page.saturating_sub(1) as u64) * page_size as u64
}

/// The match id of the most recent history entry, if any
pub fn newest_match_id(record: &RankingRecord) -> Option<MatchId> {
    match &record.state {
        RatingState::Elo(elo) => elo.history.last().map(|h| h.match_id),
        RatingState::Points(points) => points.history.last().map(|h| h.match_id)
    }
}

/// Outcome of an insert that conflicted with an existing (user, group) record:
/// the stored winner, or `AlreadyExists` if it is not visible yet
pub fn settle_lost_insert(record: &RankingRecord, winner: Option<RankingRecord>) -> Result<RankingRecord> {
    winner.ok_or(RankingError::AlreadyExists {
        user_id: record.user_id,
        group_id: record.group_id
    })
}
