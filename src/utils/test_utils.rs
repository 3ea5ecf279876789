use crate::{
    error::{RankingError, Result},
    messaging::{PublisherError, RankingNotifier, RankingsUpdatedMessage},
    model::structures::{
        group_ranking_config::{EloSettings, GroupRankingConfig},
        leaderboard::UserProfile,
        match_snapshot::{MatchSnapshot, MatchStatus, PlayerMatchStats, Team, TeamPlayer},
        ranking_record::{RankingRecord, RatingState},
        GroupId, MatchId, UserId
    },
    service::providers::{GroupProvider, MatchProvider, UserProvider}
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, RwLock
    }
};
use uuid::Uuid;

pub fn generate_player() -> TeamPlayer {
    TeamPlayer {
        user_id: Uuid::new_v4(),
        stats: None
    }
}

pub fn generate_stats_player(kills: i32, deaths: i32, assists: i32) -> TeamPlayer {
    TeamPlayer {
        user_id: Uuid::new_v4(),
        stats: Some(PlayerMatchStats {
            kills: Some(kills),
            deaths: Some(deaths),
            assists: Some(assists)
        })
    }
}

/// A completed, ranked match in a fresh group
pub fn generate_match(teams: Vec<Vec<TeamPlayer>>, winner: Option<usize>) -> MatchSnapshot {
    generate_group_match(Uuid::new_v4(), teams, winner)
}

pub fn generate_group_match(group_id: GroupId, teams: Vec<Vec<TeamPlayer>>, winner: Option<usize>) -> MatchSnapshot {
    MatchSnapshot {
        id: Uuid::new_v4(),
        group_id,
        status: MatchStatus::Completed,
        is_ranked: true,
        teams: teams.into_iter().map(|players| Team { players }).collect(),
        winner,
        completed_at: Some(Utc::now())
    }
}

/// A fresh ELO record (default settings) sitting at `rating`
pub fn generate_elo_record(group_id: GroupId, rating: i32) -> RankingRecord {
    let config = GroupRankingConfig::elo(EloSettings::default());
    let mut record = RankingRecord::initialize(Uuid::new_v4(), group_id, &config, Utc::now());

    if let RatingState::Elo(elo) = &mut record.state {
        elo.rating = rating;
        elo.peak = rating.max(config.elo.initial_rating);
    }

    record
}

/// `items` in an order determined by `seed`
pub fn shuffled<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = items.to_vec();
    out.shuffle(&mut rng);
    out
}

fn lock_error() -> RankingError {
    RankingError::PersistenceFailure("Failed to acquire provider lock".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryMatchProvider {
    matches: RwLock<HashMap<MatchId, MatchSnapshot>>
}

impl InMemoryMatchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: MatchSnapshot) {
        if let Ok(mut matches) = self.matches.write() {
            matches.insert(snapshot.id, snapshot);
        }
    }
}

#[async_trait]
impl MatchProvider for InMemoryMatchProvider {
    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchSnapshot>> {
        let matches = self.matches.read().map_err(|_| lock_error())?;
        Ok(matches.get(&match_id).cloned())
    }

    async fn completed_ranked_matches(&self, group_id: GroupId) -> Result<Vec<MatchId>> {
        let matches = self.matches.read().map_err(|_| lock_error())?;
        let mut completed = matches
            .values()
            .filter(|m| m.group_id == group_id && m.status == MatchStatus::Completed && m.is_ranked)
            .map(|m| (m.completed_at, m.id))
            .collect::<Vec<_>>();
        completed.sort();

        Ok(completed.into_iter().map(|(_, id)| id).collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGroupProvider {
    groups: RwLock<HashMap<GroupId, GroupRankingConfig>>
}

impl InMemoryGroupProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, group_id: GroupId, config: GroupRankingConfig) {
        if let Ok(mut groups) = self.groups.write() {
            groups.insert(group_id, config);
        }
    }
}

#[async_trait]
impl GroupProvider for InMemoryGroupProvider {
    async fn get_group_ranking_config(&self, group_id: GroupId) -> Result<Option<GroupRankingConfig>> {
        let groups = self.groups.read().map_err(|_| lock_error())?;
        Ok(groups.get(&group_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserProvider {
    users: RwLock<HashMap<UserId, UserProfile>>,
    unavailable: AtomicBool
}

impl InMemoryUserProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: UserId, username: &str, display_name: Option<&str>) {
        if let Ok(mut users) = self.users.write() {
            users.insert(
                user_id,
                UserProfile {
                    user_id,
                    username: username.to_string(),
                    display_name: display_name.map(str::to_string)
                }
            );
        }
    }

    /// While set, every lookup fails
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserProvider for InMemoryUserProvider {
    async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RankingError::PersistenceFailure("User provider unavailable".to_string()));
        }

        let users = self.users.read().map_err(|_| lock_error())?;
        Ok(user_ids
            .iter()
            .filter_map(|id| users.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

/// Keeps every published message; optionally fails every publish
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<RankingsUpdatedMessage>>,
    failing: AtomicBool
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<RankingsUpdatedMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RankingNotifier for RecordingNotifier {
    async fn rankings_updated(&self, message: &RankingsUpdatedMessage) -> std::result::Result<(), PublisherError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublisherError::NotInitialized);
        }

        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }

        Ok(())
    }
}

/// Shifts a match's completion time, so group processing order can be controlled
pub fn completed_minutes_ago(mut snapshot: MatchSnapshot, minutes: i64) -> MatchSnapshot {
    snapshot.completed_at = Some(Utc::now() - Duration::minutes(minutes));
    snapshot
}
