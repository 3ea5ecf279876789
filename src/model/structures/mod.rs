use uuid::Uuid;

pub mod adjustment;
pub mod group_ranking_config;
pub mod leaderboard;
pub mod match_outcome;
pub mod match_snapshot;
pub mod ranking_mode;
pub mod ranking_record;

pub type RankingId = Uuid;
pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type MatchId = Uuid;
