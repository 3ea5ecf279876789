use crate::error::{RankingError, Result};

use super::{
    adjustment::{AppliedAdjustment, PlannedAdjustment, RatingDelta},
    group_ranking_config::{EloSettings, GroupRankingConfig},
    match_outcome::MatchOutcome,
    ranking_mode::RankingMode,
    GroupId, MatchId, RankingId, UserId
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's standing within one group. Unique per (user, group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRecord {
    pub id: RankingId,
    pub user_id: UserId,
    pub group_id: GroupId,
    pub state: RatingState,
    pub stats: RankingStats,
    pub is_active: bool,
    /// Bumped on every successful write; used for compare-and-swap
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>
}

/// Mode-specific sub-state. The variant is the record's mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RatingState {
    Elo(EloState),
    Points(PointsState)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloState {
    pub rating: i32,
    pub peak: i32,
    pub history: Vec<EloHistoryEntry>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloHistoryEntry {
    pub match_id: MatchId,
    pub rating_before: i32,
    pub rating_after: i32,
    /// `rating_after - rating_before`, after clamping
    pub delta: i32,
    pub timestamp: DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsState {
    pub total: i32,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub history: Vec<PointsHistoryEntry>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsHistoryEntry {
    pub match_id: MatchId,
    pub points_delta: i32,
    pub reason: String,
    pub timestamp: DateTime<Utc>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingStats {
    pub matches_played: i32,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    /// wins / matches_played, 0 when nothing has been played
    pub win_rate: f64,
    /// Positive for a win streak, negative for a loss streak, 0 after a draw
    pub current_streak: i32,
    pub best_streak: i32,
    pub last_match_date: Option<DateTime<Utc>>
}

impl RankingRecord {
    /// Creates a fresh record seeded from the group's configuration at this moment.
    pub fn initialize(
        user_id: UserId,
        group_id: GroupId,
        config: &GroupRankingConfig,
        now: DateTime<Utc>
    ) -> RankingRecord {
        let state = match config.mode {
            RankingMode::Elo => {
                let rating = config.elo.clamp(config.elo.initial_rating);
                RatingState::Elo(EloState {
                    rating,
                    peak: rating,
                    history: Vec::new()
                })
            }
            RankingMode::Points => RatingState::Points(PointsState {
                total: 0,
                wins: 0,
                losses: 0,
                draws: 0,
                history: Vec::new()
            })
        };

        RankingRecord {
            id: Uuid::new_v4(),
            user_id,
            group_id,
            state,
            stats: RankingStats::default(),
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now
        }
    }

    pub fn mode(&self) -> RankingMode {
        match self.state {
            RatingState::Elo(_) => RankingMode::Elo,
            RatingState::Points(_) => RankingMode::Points
        }
    }

    /// Primary leaderboard value: rating for ELO, total for points
    pub fn sort_value(&self) -> i64 {
        match &self.state {
            RatingState::Elo(elo) => elo.rating as i64,
            RatingState::Points(points) => points.total as i64
        }
    }

    pub fn elo(&self) -> Option<&EloState> {
        match &self.state {
            RatingState::Elo(elo) => Some(elo),
            RatingState::Points(_) => None
        }
    }

    pub fn points(&self) -> Option<&PointsState> {
        match &self.state {
            RatingState::Points(points) => Some(points),
            RatingState::Elo(_) => None
        }
    }

    /// True if this match has already been folded into the record
    pub fn has_applied(&self, match_id: MatchId) -> bool {
        match &self.state {
            RatingState::Elo(elo) => elo.history.iter().any(|h| h.match_id == match_id),
            RatingState::Points(points) => points.history.iter().any(|h| h.match_id == match_id)
        }
    }

    /// Folds a planned adjustment into the record: rating/points, history and stats.
    ///
    /// The ELO delta was computed from the pre-match snapshot; here it is applied to
    /// whatever the current rating is and then clamped. Fails with `ModeMismatch`
    /// if the adjustment's mode differs from the record's, and with
    /// `InvalidMatchForRanking` if a points total would overflow. The record is
    /// untouched on failure.
    pub fn apply(
        &mut self,
        adjustment: &PlannedAdjustment,
        match_id: MatchId,
        elo_settings: &EloSettings,
        completed_at: DateTime<Utc>
    ) -> Result<AppliedAdjustment> {
        let record_mode = self.mode();
        let (before, after) = match (&mut self.state, adjustment.delta) {
            (RatingState::Elo(elo), RatingDelta::Elo { delta, .. }) => {
                let before = elo.rating;
                let after = elo_settings.clamp(before.saturating_add(delta));

                elo.rating = after;
                elo.peak = elo.peak.max(after);
                elo.history.push(EloHistoryEntry {
                    match_id,
                    rating_before: before,
                    rating_after: after,
                    delta: after - before,
                    timestamp: completed_at
                });

                (before as i64, after as i64)
            }
            (RatingState::Points(points), RatingDelta::Points { delta }) => {
                let before = points.total;
                points.total = before.checked_add(delta).ok_or_else(|| {
                    RankingError::invalid_match(
                        match_id,
                        format!("points total {} cannot absorb {}", before, delta)
                    )
                })?;

                match adjustment.outcome {
                    MatchOutcome::Win => points.wins += 1,
                    MatchOutcome::Loss => points.losses += 1,
                    MatchOutcome::Draw => points.draws += 1
                }

                points.history.push(PointsHistoryEntry {
                    match_id,
                    points_delta: delta,
                    reason: adjustment.outcome.reason().to_string(),
                    timestamp: completed_at
                });

                (before as i64, points.total as i64)
            }
            _ => {
                return Err(RankingError::ModeMismatch {
                    group_id: self.group_id,
                    record_mode,
                    group_mode: adjustment.delta.mode()
                })
            }
        };

        self.stats.record(adjustment.outcome, completed_at);
        self.updated_at = completed_at.max(self.updated_at);

        Ok(AppliedAdjustment {
            user_id: self.user_id,
            team_index: adjustment.team_index,
            outcome: adjustment.outcome,
            value_before: before,
            value_after: after,
            delta: after - before
        })
    }

    /// Rebuilds the current sort value from the history alone.
    /// `initial_rating` is ignored for points records, which always start at 0.
    pub fn replay_history(&self, initial_rating: i32) -> i64 {
        match &self.state {
            RatingState::Elo(elo) => initial_rating as i64 + elo.history.iter().map(|h| h.delta as i64).sum::<i64>(),
            RatingState::Points(points) => points.history.iter().map(|h| h.points_delta as i64).sum()
        }
    }
}
