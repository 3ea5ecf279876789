use async_trait::async_trait;
use ranking_engine::{
    cache::InMemoryCacheStore,
    database::{
        memory::InMemoryRankingStore,
        store::{RankingStore, UpsertOutcome}
    },
    error::{RankingError, Result},
    model::structures::{
        adjustment::{PlannedAdjustment, RatingDelta},
        group_ranking_config::{EloSettings, GroupRankingConfig},
        match_outcome::MatchOutcome,
        match_snapshot::TeamPlayer,
        ranking_mode::{RankingMode, SortField},
        ranking_record::RankingRecord,
        GroupId, MatchId, UserId
    },
    service::{RankingService, ServiceConfig},
    utils::test_utils::{
        generate_elo_record, generate_group_match, InMemoryGroupProvider, InMemoryMatchProvider,
        InMemoryUserProvider, RecordingNotifier
    }
};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A service wired to in-memory collaborators for a single group
pub struct Harness {
    pub group_id: GroupId,
    pub store: Arc<InMemoryRankingStore>,
    pub matches: Arc<InMemoryMatchProvider>,
    pub groups: Arc<InMemoryGroupProvider>,
    pub users: Arc<InMemoryUserProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: RankingService
}

impl Harness {
    pub fn new(config: GroupRankingConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryRankingStore::new()), Arc::new(RecordingNotifier::new()))
    }

    pub fn with_notifier(config: GroupRankingConfig, notifier: RecordingNotifier) -> Self {
        Self::with_store(config, Arc::new(InMemoryRankingStore::new()), Arc::new(notifier))
    }

    pub fn with_store(
        config: GroupRankingConfig,
        store: Arc<InMemoryRankingStore>,
        notifier: Arc<RecordingNotifier>
    ) -> Self {
        let group_id = Uuid::new_v4();
        let matches = Arc::new(InMemoryMatchProvider::new());
        let groups = Arc::new(InMemoryGroupProvider::new());
        let users = Arc::new(InMemoryUserProvider::new());
        groups.insert(group_id, config);

        let service = RankingService::new(
            store.clone(),
            matches.clone(),
            groups.clone(),
            users.clone(),
            Arc::new(InMemoryCacheStore::new()),
            ServiceConfig::default()
        )
        .with_notifier(notifier.clone());

        Self {
            group_id,
            store,
            matches,
            groups,
            users,
            notifier,
            service
        }
    }

    pub fn elo() -> Self {
        Self::new(GroupRankingConfig::elo(EloSettings::default()))
    }

    pub fn add_match(&self, teams: Vec<Vec<TeamPlayer>>, winner: Option<usize>) -> MatchId {
        let snapshot = generate_group_match(self.group_id, teams, winner);
        let id = snapshot.id;
        self.matches.insert(snapshot);
        id
    }

    /// Stores an active ELO record at `rating` and returns its user
    pub async fn seed_elo(&self, rating: i32) -> UserId {
        let record = generate_elo_record(self.group_id, rating);
        let user_id = record.user_id;
        self.store.insert_if_absent(record).await.unwrap();
        user_id
    }

    pub async fn record(&self, user_id: UserId) -> RankingRecord {
        self.store.get(user_id, self.group_id).await.unwrap().unwrap()
    }

    pub async fn rating(&self, user_id: UserId) -> i32 {
        self.record(user_id).await.elo().unwrap().rating
    }

    /// A second service over this harness's providers but a different store
    pub fn service_over(&self, store: Arc<dyn RankingStore>) -> RankingService {
        RankingService::new(
            store,
            self.matches.clone(),
            self.groups.clone(),
            self.users.clone(),
            Arc::new(InMemoryCacheStore::new()),
            ServiceConfig::default()
        )
    }
}

/// Forwards to an in-memory store, but right before the first upsert of
/// `contested` it commits a foreign ELO adjustment to that user's record,
/// as a concurrent match would.
pub struct InterleavingStore {
    pub inner: Arc<InMemoryRankingStore>,
    contested: UserId,
    foreign_delta: i32,
    foreign_match: Mutex<Option<MatchId>>
}

impl InterleavingStore {
    pub fn new(inner: Arc<InMemoryRankingStore>, contested: UserId, foreign_delta: i32) -> Self {
        Self {
            inner,
            contested,
            foreign_delta,
            foreign_match: Mutex::new(Some(Uuid::new_v4()))
        }
    }
}

#[async_trait]
impl RankingStore for InterleavingStore {
    async fn get(&self, user_id: UserId, group_id: GroupId) -> Result<Option<RankingRecord>> {
        self.inner.get(user_id, group_id).await
    }

    async fn insert_if_absent(&self, record: RankingRecord) -> Result<RankingRecord> {
        self.inner.insert_if_absent(record).await
    }

    async fn upsert(&self, record: &RankingRecord) -> Result<UpsertOutcome> {
        let foreign = if record.user_id == self.contested {
            self.foreign_match.lock().unwrap().take()
        } else {
            None
        };

        if let Some(foreign_match) = foreign {
            let mut current = self.inner.get(record.user_id, record.group_id).await?.unwrap();
            let adjustment = PlannedAdjustment {
                user_id: record.user_id,
                team_index: 0,
                outcome: MatchOutcome::Win,
                delta: RatingDelta::Elo {
                    rating_before: current.elo().unwrap().rating,
                    expected_score: 0.5,
                    delta: self.foreign_delta
                }
            };
            current.apply(&adjustment, foreign_match, &EloSettings::default(), Utc::now())?;
            assert!(matches!(self.inner.upsert(&current).await?, UpsertOutcome::Written(_)));
        }

        self.inner.upsert(record).await
    }

    async fn count_with_better_value(&self, group_id: GroupId, sort_field: SortField, value: i64) -> Result<u64> {
        self.inner.count_with_better_value(group_id, sort_field, value).await
    }

    async fn list_by_group(
        &self,
        group_id: GroupId,
        sort_field: SortField,
        page: u32,
        page_size: u32
    ) -> Result<(Vec<RankingRecord>, u64)> {
        self.inner.list_by_group(group_id, sort_field, page, page_size).await
    }

    async fn modes_in_group(&self, group_id: GroupId) -> Result<Vec<RankingMode>> {
        self.inner.modes_in_group(group_id).await
    }
}

/// Reports `AlreadyExists` on every insert, as a store that lost an insert race
/// it could not reconcile would. With `commit_winner` a competing record for the
/// same (user, group) lands first, so a re-read finds it.
pub struct RacingInsertStore {
    pub inner: Arc<InMemoryRankingStore>,
    commit_winner: bool
}

impl RacingInsertStore {
    pub fn new(inner: Arc<InMemoryRankingStore>, commit_winner: bool) -> Self {
        Self { inner, commit_winner }
    }
}

#[async_trait]
impl RankingStore for RacingInsertStore {
    async fn get(&self, user_id: UserId, group_id: GroupId) -> Result<Option<RankingRecord>> {
        self.inner.get(user_id, group_id).await
    }

    async fn insert_if_absent(&self, record: RankingRecord) -> Result<RankingRecord> {
        if self.commit_winner {
            let mut winner = record.clone();
            winner.id = Uuid::new_v4();
            self.inner.insert_if_absent(winner).await?;
        }

        Err(RankingError::AlreadyExists {
            user_id: record.user_id,
            group_id: record.group_id
        })
    }

    async fn upsert(&self, record: &RankingRecord) -> Result<UpsertOutcome> {
        self.inner.upsert(record).await
    }

    async fn count_with_better_value(&self, group_id: GroupId, sort_field: SortField, value: i64) -> Result<u64> {
        self.inner.count_with_better_value(group_id, sort_field, value).await
    }

    async fn list_by_group(
        &self,
        group_id: GroupId,
        sort_field: SortField,
        page: u32,
        page_size: u32
    ) -> Result<(Vec<RankingRecord>, u64)> {
        self.inner.list_by_group(group_id, sort_field, page, page_size).await
    }

    async fn modes_in_group(&self, group_id: GroupId) -> Result<Vec<RankingMode>> {
        self.inner.modes_in_group(group_id).await
    }
}
