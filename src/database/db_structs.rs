use crate::{
    error::{RankingError, Result},
    model::structures::{
        ranking_mode::RankingMode,
        ranking_record::{
            EloHistoryEntry, EloState, PointsHistoryEntry, PointsState, RankingRecord, RankingStats, RatingState
        },
        GroupId, MatchId, RankingId, UserId
    }
};
use chrono::{DateTime, Utc};
use tokio_postgres::Row;

/// Flat mirror of a `rankings` row. Mode-specific columns are NULL for the other mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub id: RankingId,
    pub user_id: UserId,
    pub group_id: GroupId,
    pub mode: i16,
    pub rating: Option<i32>,
    pub peak: Option<i32>,
    pub points_total: Option<i32>,
    pub points_wins: Option<i32>,
    pub points_losses: Option<i32>,
    pub points_draws: Option<i32>,
    pub matches_played: i32,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub win_rate: f64,
    pub current_streak: i32,
    pub best_streak: i32,
    pub last_match_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>
}

/// One `ranking_history` row. ELO entries fill `rating_before`/`rating_after`,
/// points entries fill `reason`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub ranking_id: RankingId,
    pub match_id: MatchId,
    pub rating_before: Option<i32>,
    pub rating_after: Option<i32>,
    pub delta: i32,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>
}

impl RankingRow {
    pub fn from_row(row: &Row) -> Result<RankingRow> {
        Ok(RankingRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            group_id: row.try_get("group_id")?,
            mode: row.try_get("mode")?,
            rating: row.try_get("rating")?,
            peak: row.try_get("peak")?,
            points_total: row.try_get("points_total")?,
            points_wins: row.try_get("points_wins")?,
            points_losses: row.try_get("points_losses")?,
            points_draws: row.try_get("points_draws")?,
            matches_played: row.try_get("matches_played")?,
            wins: row.try_get("wins")?,
            losses: row.try_get("losses")?,
            draws: row.try_get("draws")?,
            win_rate: row.try_get("win_rate")?,
            current_streak: row.try_get("current_streak")?,
            best_streak: row.try_get("best_streak")?,
            last_match_date: row.try_get("last_match_date")?,
            is_active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?
        })
    }

    pub fn from_record(record: &RankingRecord) -> RankingRow {
        let (rating, peak) = match record.elo() {
            Some(elo) => (Some(elo.rating), Some(elo.peak)),
            None => (None, None)
        };
        let (points_total, points_wins, points_losses, points_draws) = match record.points() {
            Some(p) => (Some(p.total), Some(p.wins), Some(p.losses), Some(p.draws)),
            None => (None, None, None, None)
        };

        RankingRow {
            id: record.id,
            user_id: record.user_id,
            group_id: record.group_id,
            mode: record.mode() as i16,
            rating,
            peak,
            points_total,
            points_wins,
            points_losses,
            points_draws,
            matches_played: record.stats.matches_played,
            wins: record.stats.wins,
            losses: record.stats.losses,
            draws: record.stats.draws,
            win_rate: record.stats.win_rate,
            current_streak: record.stats.current_streak,
            best_streak: record.stats.best_streak,
            last_match_date: record.stats.last_match_date,
            is_active: record.is_active,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at
        }
    }

    /// Rebuilds the record. `history` must belong to this ranking, oldest first.
    pub fn into_record(self, history: Vec<HistoryRow>) -> Result<RankingRecord> {
        let mode = RankingMode::try_from(self.mode)
            .map_err(|_| corrupt(self.id, format!("unknown ranking mode {}", self.mode)))?;

        let state = match mode {
            RankingMode::Elo => RatingState::Elo(EloState {
                rating: self.rating.ok_or_else(|| corrupt(self.id, "ELO ranking without rating"))?,
                peak: self.peak.ok_or_else(|| corrupt(self.id, "ELO ranking without peak"))?,
                history: history
                    .into_iter()
                    .map(|h| {
                        Ok(EloHistoryEntry {
                            match_id: h.match_id,
                            rating_before: h.rating_before.ok_or_else(|| corrupt(self.id, "history without rating"))?,
                            rating_after: h.rating_after.ok_or_else(|| corrupt(self.id, "history without rating"))?,
                            delta: h.delta,
                            timestamp: h.timestamp
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }),
            RankingMode::Points => RatingState::Points(PointsState {
                total: self.points_total.ok_or_else(|| corrupt(self.id, "points ranking without total"))?,
                wins: self.points_wins.unwrap_or_default(),
                losses: self.points_losses.unwrap_or_default(),
                draws: self.points_draws.unwrap_or_default(),
                history: history
                    .into_iter()
                    .map(|h| PointsHistoryEntry {
                        match_id: h.match_id,
                        points_delta: h.delta,
                        reason: h.reason.unwrap_or_default(),
                        timestamp: h.timestamp
                    })
                    .collect()
            })
        };

        Ok(RankingRecord {
            id: self.id,
            user_id: self.user_id,
            group_id: self.group_id,
            state,
            stats: RankingStats {
                matches_played: self.matches_played,
                wins: self.wins,
                losses: self.losses,
                draws: self.draws,
                win_rate: self.win_rate,
                current_streak: self.current_streak,
                best_streak: self.best_streak,
                last_match_date: self.last_match_date
            },
            is_active: self.is_active,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at
        })
    }
}

impl HistoryRow {
    pub fn from_row(row: &Row) -> Result<HistoryRow> {
        Ok(HistoryRow {
            ranking_id: row.try_get("ranking_id")?,
            match_id: row.try_get("match_id")?,
            rating_before: row.try_get("rating_before")?,
            rating_after: row.try_get("rating_after")?,
            delta: row.try_get("delta")?,
            reason: row.try_get("reason")?,
            timestamp: row.try_get("timestamp")?
        })
    }

    /// All history rows of a record, oldest first
    pub fn from_record(record: &RankingRecord) -> Vec<HistoryRow> {
        match &record.state {
            RatingState::Elo(elo) => elo
                .history
                .iter()
                .map(|h| HistoryRow {
                    ranking_id: record.id,
                    match_id: h.match_id,
                    rating_before: Some(h.rating_before),
                    rating_after: Some(h.rating_after),
                    delta: h.delta,
                    reason: None,
                    timestamp: h.timestamp
                })
                .collect(),
            RatingState::Points(points) => points
                .history
                .iter()
                .map(|h| HistoryRow {
                    ranking_id: record.id,
                    match_id: h.match_id,
                    rating_before: None,
                    rating_after: None,
                    delta: h.points_delta,
                    reason: Some(h.reason.clone()),
                    timestamp: h.timestamp
                })
                .collect()
        }
    }
}

fn corrupt(id: RankingId, reason: impl Into<String>) -> RankingError {
    RankingError::PersistenceFailure(format!("Ranking {} is corrupt: {}", id, reason.into()))
}
