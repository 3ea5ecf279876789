use super::{match_outcome::MatchOutcome, ranking_mode::RankingMode, UserId};
use serde::{Deserialize, Serialize};

/// A rating change computed from the pre-match snapshot, not yet written
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAdjustment {
    pub user_id: UserId,
    pub team_index: usize,
    pub outcome: MatchOutcome,
    pub delta: RatingDelta
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RatingDelta {
    Elo {
        /// Rating the delta was computed against
        rating_before: i32,
        expected_score: f64,
        delta: i32
    },
    Points {
        delta: i32
    }
}

impl RatingDelta {
    pub fn mode(&self) -> RankingMode {
        match self {
            RatingDelta::Elo { .. } => RankingMode::Elo,
            RatingDelta::Points { .. } => RankingMode::Points
        }
    }
}

/// What actually landed in a record after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAdjustment {
    pub user_id: UserId,
    pub team_index: usize,
    pub outcome: MatchOutcome,
    pub value_before: i64,
    pub value_after: i64,
    pub delta: i64
}
