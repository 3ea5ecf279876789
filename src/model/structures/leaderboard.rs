use super::{ranking_record::RankingRecord, UserId};
use serde::{Deserialize, Serialize};

/// Display fields joined from the user provider at query time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>
}

/// A record annotated with its computed rank. `rank` is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRecord {
    #[serde(flatten)]
    pub record: RankingRecord,
    pub rank: u64,
    pub user: Option<UserProfile>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub records: Vec<RankedRecord>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32
}

/// A single user's standing. `rank` is absent for deactivated records, which
/// take no part in ranking but are still reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRanking {
    #[serde(flatten)]
    pub record: RankingRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    pub user: Option<UserProfile>
}
