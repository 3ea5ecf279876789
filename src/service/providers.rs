use crate::{
    error::Result,
    model::structures::{
        group_ranking_config::GroupRankingConfig, leaderboard::UserProfile, match_snapshot::MatchSnapshot, GroupId,
        MatchId, UserId
    }
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Read-only access to matches, owned by the match lifecycle outside this crate
#[async_trait]
pub trait MatchProvider: Send + Sync {
    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchSnapshot>>;

    /// Completed, ranked matches of a group, oldest completion first
    async fn completed_ranked_matches(&self, group_id: GroupId) -> Result<Vec<MatchId>>;
}

#[async_trait]
pub trait GroupProvider: Send + Sync {
    async fn get_group_ranking_config(&self, group_id: GroupId) -> Result<Option<GroupRankingConfig>>;
}

#[async_trait]
pub trait UserProvider: Send + Sync {
    /// Profiles for the given users. Unknown users are simply absent from the map.
    async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>>;
}
