use super::providers::{GroupProvider, MatchProvider, UserProvider};
use crate::{
    cache::{CacheStore, LeaderboardCache},
    database::store::{page_offset, RankingStore, UpsertOutcome},
    error::{RankingError, Result},
    messaging::{RankingNotifier, RankingsUpdatedMessage},
    model::{
        constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_MAX_WRITE_ATTEMPTS, MAX_PAGE_SIZE},
        plan_match,
        structures::{
            adjustment::{AppliedAdjustment, PlannedAdjustment},
            group_ranking_config::{EloSettings, GroupRankingConfig},
            leaderboard::{Leaderboard, RankedRecord, UserProfile, UserRanking},
            ranking_mode::RankingMode,
            ranking_record::{RankingRecord, RatingState},
            GroupId, MatchId, UserId
        }
    },
    utils::progress_utils::progress_bar
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Maximum age of a cached leaderboard page
    pub cache_ttl: Duration,
    /// Compare-and-swap attempts per player write before giving up
    pub max_write_attempts: u32
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS
        }
    }
}

/// Outcome of applying one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchApplication {
    pub match_id: MatchId,
    pub group_id: GroupId,
    pub mode: RankingMode,
    /// Adjustments written by this call
    pub applied: Vec<AppliedAdjustment>,
    /// Players whose record already contained this match
    pub already_applied: Vec<UserId>
}

impl MatchApplication {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProcessingSummary {
    pub group_id: GroupId,
    pub matches_seen: usize,
    pub matches_applied: usize,
    pub adjustments_written: usize,
    /// Matches rejected as unrankable; they are skipped, not retried
    pub rejected: Vec<MatchId>
}

enum WriteResult {
    Applied(AppliedAdjustment),
    AlreadyApplied(UserId)
}

/// Entry point of the ranking engine.
///
/// Owns no state of its own: records live in the `RankingStore`, leaderboard
/// pages in the cache, match/group/user data with the providers.
pub struct RankingService {
    store: Arc<dyn RankingStore>,
    matches: Arc<dyn MatchProvider>,
    groups: Arc<dyn GroupProvider>,
    users: Arc<dyn UserProvider>,
    cache: LeaderboardCache,
    notifier: Option<Arc<dyn RankingNotifier>>,
    config: ServiceConfig
}

impl RankingService {
    pub fn new(
        store: Arc<dyn RankingStore>,
        matches: Arc<dyn MatchProvider>,
        groups: Arc<dyn GroupProvider>,
        users: Arc<dyn UserProvider>,
        cache_store: Arc<dyn CacheStore>,
        config: ServiceConfig
    ) -> Self {
        Self {
            store,
            matches,
            groups,
            users,
            cache: LeaderboardCache::new(cache_store, config.cache_ttl),
            notifier: None,
            config
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RankingNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> ServiceConfig {
        self.config
    }

    async fn group_config(&self, group_id: GroupId) -> Result<GroupRankingConfig> {
        let config = self
            .groups
            .get_group_ranking_config(group_id)
            .await?
            .ok_or_else(|| RankingError::not_found("Group", group_id))?;

        if let Some(reason) = config.problem() {
            return Err(RankingError::InvalidGroupConfig { group_id, reason });
        }

        Ok(config)
    }

    /// Insert-if-absent, so concurrent first appearances of a player converge on one record
    async fn load_or_initialize(
        &self,
        user_id: UserId,
        group_id: GroupId,
        config: &GroupRankingConfig
    ) -> Result<(RankingRecord, bool)> {
        if let Some(existing) = self.store.get(user_id, group_id).await? {
            return Ok((existing, false));
        }

        let candidate = RankingRecord::initialize(user_id, group_id, config, Utc::now());
        let candidate_id = candidate.id;
        let stored = match self.store.insert_if_absent(candidate).await {
            Ok(stored) => stored,
            // Lost an insert race the store could not resolve; the winner should be readable now
            Err(RankingError::AlreadyExists { .. }) => {
                debug!(user_id = %user_id, group_id = %group_id, "Ranking insert raced, reading winner");
                self.store
                    .get(user_id, group_id)
                    .await?
                    .ok_or(RankingError::AlreadyExists { user_id, group_id })?
            }
            Err(e) => return Err(e)
        };
        let created = stored.id == candidate_id;

        if created {
            debug!(user_id = %user_id, group_id = %group_id, mode = ?config.mode, "Initialized ranking");
        }

        Ok((stored, created))
    }

    /// Returns the user's record in the group, creating it from the group's current
    /// configuration if it does not exist yet. Calling this repeatedly is safe.
    pub async fn initialize_ranking(&self, user_id: UserId, group_id: GroupId) -> Result<RankingRecord> {
        let config = self.group_config(group_id).await?;
        let (record, created) = self.load_or_initialize(user_id, group_id, &config).await?;

        if created {
            self.invalidate(group_id).await;
        }

        Ok(record)
    }

    /// Applies a completed, ranked match to every participant's record.
    ///
    /// All deltas are computed from one snapshot of the participants' ratings
    /// taken before any write. Players whose record already holds this match are
    /// skipped, which makes retrying after a partial failure safe. If any write
    /// fails the call fails, but writes that already landed stay in place.
    pub async fn apply_match_result(&self, match_id: MatchId) -> Result<MatchApplication> {
        let snapshot = self
            .matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| RankingError::not_found("Match", match_id))?;

        if let Some(reason) = snapshot.structural_problem() {
            return Err(RankingError::invalid_match(match_id, reason));
        }

        let config = self.group_config(snapshot.group_id).await?;

        if config.mode == RankingMode::Elo {
            if let Some((team_index, _)) = snapshot
                .participants()
                .find(|(team_index, _)| snapshot.opponents_of(*team_index).next().is_none())
            {
                return Err(RankingError::invalid_match(
                    match_id,
                    format!("team {} has no opponents", team_index)
                ));
            }
        }

        let loaded = join_all(
            snapshot
                .participants()
                .map(|(_, player)| self.load_or_initialize(player.user_id, snapshot.group_id, &config))
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let created_any = loaded.iter().any(|(_, created)| *created);
        let records: HashMap<UserId, RankingRecord> =
            loaded.into_iter().map(|(record, _)| (record.user_id, record)).collect();

        if let Some(record) = records.values().find(|r| r.mode() != config.mode) {
            return Err(RankingError::ModeMismatch {
                group_id: snapshot.group_id,
                record_mode: record.mode(),
                group_mode: config.mode
            });
        }

        let pre_match_ratings = records
            .values()
            .filter_map(|r| pre_match_rating(r, match_id).map(|rating| (r.user_id, rating)))
            .collect::<HashMap<_, _>>();

        let planned = plan_match(&snapshot, &config, &pre_match_ratings)?;
        let completed_at = snapshot.completed_at.unwrap_or_else(Utc::now);
        let elo_settings = &config.elo;

        let results = join_all(planned.iter().map(|adjustment| {
            let record = records.get(&adjustment.user_id).cloned();
            async move {
                let record = record.ok_or_else(|| RankingError::not_found("Ranking", adjustment.user_id))?;
                self.write_adjustment(record, adjustment, match_id, elo_settings, completed_at)
                    .await
            }
        }))
        .await;

        let mut applied = Vec::new();
        let mut already_applied = Vec::new();
        let mut first_error = None;

        for result in results {
            match result {
                Ok(WriteResult::Applied(a)) => applied.push(a),
                Ok(WriteResult::AlreadyApplied(user_id)) => already_applied.push(user_id),
                Err(e) => {
                    warn!(match_id = %match_id, error = %e, "Failed to write ranking");
                    first_error.get_or_insert(e);
                }
            }
        }

        if created_any || !applied.is_empty() {
            self.invalidate(snapshot.group_id).await;
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        if !applied.is_empty() {
            self.publish(RankingsUpdatedMessage {
                group_id: snapshot.group_id,
                match_id: Some(match_id),
                user_ids: applied.iter().map(|a| a.user_id).collect(),
                processed_at: Utc::now()
            })
            .await;
        }

        info!(
            match_id = %match_id,
            group_id = %snapshot.group_id,
            applied = applied.len(),
            skipped = already_applied.len(),
            "Applied match result"
        );

        Ok(MatchApplication {
            match_id,
            group_id: snapshot.group_id,
            mode: config.mode,
            applied,
            already_applied
        })
    }

    /// Read-modify-write of one player for one match, retried on version conflicts.
    /// The planned delta is reused as-is on every attempt.
    async fn write_adjustment(
        &self,
        mut record: RankingRecord,
        adjustment: &PlannedAdjustment,
        match_id: MatchId,
        elo_settings: &EloSettings,
        completed_at: DateTime<Utc>
    ) -> Result<WriteResult> {
        for attempt in 1..=self.config.max_write_attempts {
            if record.has_applied(match_id) {
                return Ok(WriteResult::AlreadyApplied(record.user_id));
            }

            let mut updated = record.clone();
            let applied = updated
                .apply(adjustment, match_id, elo_settings, completed_at)?;

            match self.store.upsert(&updated).await? {
                UpsertOutcome::Written(_) => return Ok(WriteResult::Applied(applied)),
                UpsertOutcome::Conflict => {
                    warn!(
                        user_id = %record.user_id,
                        match_id = %match_id,
                        attempt,
                        "Ranking changed concurrently, retrying"
                    );
                    record = self
                        .store
                        .get(record.user_id, record.group_id)
                        .await?
                        .ok_or_else(|| RankingError::not_found("Ranking", record.user_id))?;
                }
            }
        }

        Err(RankingError::PersistenceFailure(format!(
            "Gave up writing ranking for user {} after {} conflicting attempts",
            record.user_id, self.config.max_write_attempts
        )))
    }

    /// One page of the group's active records, best first, each with its competition rank
    pub async fn get_leaderboard(&self, group_id: GroupId, page: u32, page_size: u32) -> Result<Leaderboard> {
        if page == 0 || page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(RankingError::InvalidPagination { page, page_size });
        }

        let config = self.group_config(group_id).await?;

        let lookup = match self.cache.lookup(group_id, page, page_size).await {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                warn!(group_id = %group_id, error = %e, "Leaderboard cache unavailable");
                None
            }
        };

        if let Some(hit) = lookup.as_ref().and_then(|l| l.hit.clone()) {
            return Ok(hit);
        }

        let sort_field = config.mode.sort_field();
        let (records, total) = self.store.list_by_group(group_id, sort_field, page, page_size).await?;

        let ranks = match records.first() {
            Some(first) => {
                let first_rank = self
                    .store
                    .count_with_better_value(group_id, sort_field, first.sort_value())
                    .await?
                    + 1;
                page_ranks(&records, first_rank, page_offset(page, page_size))
            }
            None => Vec::new()
        };

        let user_ids = records.iter().map(|r| r.user_id).collect_vec();
        let mut profiles = self.profiles(&user_ids).await;

        let leaderboard = Leaderboard {
            records: records
                .into_iter()
                .zip(ranks)
                .map(|(record, rank)| RankedRecord {
                    user: profiles.remove(&record.user_id),
                    record,
                    rank
                })
                .collect(),
            total,
            page,
            page_size
        };

        let Some(lookup) = lookup else {
            return Ok(leaderboard);
        };

        match self.cache.store(&lookup.key, &leaderboard).await {
            Ok(served) => Ok(served),
            Err(e) => {
                warn!(group_id = %group_id, error = %e, "Failed to cache leaderboard page");
                Ok(leaderboard)
            }
        }
    }

    /// The user's record in the group. Active records carry their competition
    /// rank; deactivated ones come back without a rank.
    pub async fn get_user_ranking(&self, user_id: UserId, group_id: GroupId) -> Result<Option<UserRanking>> {
        let Some(record) = self.store.get(user_id, group_id).await? else {
            return Ok(None);
        };

        let rank = if record.is_active {
            Some(
                self.store
                    .count_with_better_value(group_id, record.mode().sort_field(), record.sort_value())
                    .await?
                    + 1
            )
        } else {
            None
        };
        let mut profiles = self.profiles(&[user_id]).await;

        Ok(Some(UserRanking {
            user: profiles.remove(&user_id),
            record,
            rank
        }))
    }

    /// Soft-deletes a record: it keeps its history but leaves leaderboards and rank counts
    pub async fn deactivate_ranking(&self, user_id: UserId, group_id: GroupId) -> Result<RankingRecord> {
        let mut record = self
            .store
            .get(user_id, group_id)
            .await?
            .ok_or_else(|| RankingError::not_found("Ranking", user_id))?;

        for attempt in 1..=self.config.max_write_attempts {
            if !record.is_active {
                return Ok(record);
            }

            let mut updated = record.clone();
            updated.is_active = false;
            updated.updated_at = Utc::now();

            match self.store.upsert(&updated).await? {
                UpsertOutcome::Written(written) => {
                    self.invalidate(group_id).await;
                    self.publish(RankingsUpdatedMessage {
                        group_id,
                        match_id: None,
                        user_ids: vec![user_id],
                        processed_at: Utc::now()
                    })
                    .await;

                    info!(user_id = %user_id, group_id = %group_id, "Deactivated ranking");
                    return Ok(written);
                }
                UpsertOutcome::Conflict => {
                    warn!(user_id = %user_id, attempt, "Ranking changed concurrently, retrying deactivation");
                    record = self
                        .store
                        .get(user_id, group_id)
                        .await?
                        .ok_or_else(|| RankingError::not_found("Ranking", user_id))?;
                }
            }
        }

        Err(RankingError::PersistenceFailure(format!(
            "Gave up deactivating ranking for user {} after {} conflicting attempts",
            user_id, self.config.max_write_attempts
        )))
    }

    /// Rejects switching a group to `new_mode` while it holds records of another mode
    pub async fn validate_mode_change(&self, group_id: GroupId, new_mode: RankingMode) -> Result<()> {
        let modes = self.store.modes_in_group(group_id).await?;

        match modes.into_iter().find(|m| *m != new_mode) {
            Some(record_mode) => Err(RankingError::ModeMismatch {
                group_id,
                record_mode,
                group_mode: new_mode
            }),
            None => Ok(())
        }
    }

    /// Applies every completed, ranked match of the group in completion order.
    ///
    /// Matches already folded into the records are skipped per player. Unrankable
    /// matches are reported and skipped; store failures abort the run.
    pub async fn process_group(&self, group_id: GroupId) -> Result<GroupProcessingSummary> {
        // A group that cannot rank anything fails the run instead of rejecting every match
        self.group_config(group_id).await?;

        let match_ids = self.matches.completed_ranked_matches(group_id).await?;
        let bar = progress_bar(match_ids.len() as u64, format!("Processing group {}", group_id));

        let mut summary = GroupProcessingSummary {
            group_id,
            matches_seen: match_ids.len(),
            ..Default::default()
        };

        for match_id in match_ids {
            match self.apply_match_result(match_id).await {
                Ok(application) => {
                    if !application.is_noop() {
                        summary.matches_applied += 1;
                        summary.adjustments_written += application.applied.len();
                    }
                }
                Err(e) if !e.is_retryable() => {
                    warn!(match_id = %match_id, error = %e, "Skipping unrankable match");
                    summary.rejected.push(match_id);
                }
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            }

            bar.inc(1);
        }

        bar.finish();
        info!(
            group_id = %group_id,
            applied = summary.matches_applied,
            rejected = summary.rejected.len(),
            "Processed group"
        );

        Ok(summary)
    }

    async fn invalidate(&self, group_id: GroupId) {
        if let Err(e) = self.cache.invalidate(group_id).await {
            warn!(group_id = %group_id, error = %e, "Failed to invalidate leaderboard cache");
        }
    }

    async fn publish(&self, message: RankingsUpdatedMessage) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.rankings_updated(&message).await {
                warn!(group_id = %message.group_id, error = %e, "Failed to publish rankings update");
            }
        }
    }

    /// Display profiles; enrichment failures degrade to records without profiles
    async fn profiles(&self, user_ids: &[UserId]) -> HashMap<UserId, UserProfile> {
        match self.users.get_profiles(user_ids).await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!(error = %e, "Failed to load user profiles");
                HashMap::new()
            }
        }
    }
}

/// The ELO rating a record had before `match_id`: read from the match's history
/// entry if it was already applied, otherwise the current rating.
/// `None` for points records, which need no snapshot.
fn pre_match_rating(record: &RankingRecord, match_id: MatchId) -> Option<i32> {
    match &record.state {
        RatingState::Elo(elo) => Some(
            elo.history
                .iter()
                .find(|h| h.match_id == match_id)
                .map_or(elo.rating, |h| h.rating_before)
        ),
        RatingState::Points(_) => None
    }
}

/// Competition ranks for one sorted page. `first_rank` is the rank of the first
/// record; `offset` is its zero-based position in the full ordering.
fn page_ranks(records: &[RankingRecord], first_rank: u64, offset: u64) -> Vec<u64> {
    let mut ranks: Vec<u64> = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let rank = match (i, ranks.last()) {
            (0, _) | (_, None) => first_rank,
            (_, Some(&previous)) if records[i - 1].sort_value() == record.sort_value() => previous,
            _ => offset + i as u64 + 1
        };
        ranks.push(rank);
    }

    ranks
}
