use super::{
    db_structs::{HistoryRow, RankingRow},
    store::{newest_match_id, page_offset, settle_lost_insert, RankingStore, UpsertOutcome}
};
use crate::{
    error::{RankingError, Result},
    model::structures::{
        group_ranking_config::{EloSettings, GroupRankingConfig, PointsSettings},
        leaderboard::UserProfile,
        match_snapshot::{MatchSnapshot, MatchStatus, PlayerMatchStats, Team, TeamPlayer},
        ranking_mode::{RankingMode, SortField},
        ranking_record::RankingRecord,
        GroupId, MatchId, RankingId, UserId
    },
    service::providers::{GroupProvider, MatchProvider, UserProvider}
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use postgres_types::ToSql;
use std::{collections::HashMap, sync::Arc};
use tokio_postgres::{Client, Error, NoTls};
use tracing::{debug, error, info};

const RANKING_COLUMNS: &str = "id, user_id, group_id, mode, rating, peak, points_total, points_wins, points_losses, \
     points_draws, matches_played, wins, losses, draws, win_rate, current_streak, best_streak, last_match_date, \
     is_active, version, created_at, updated_at";

/// `unnest` over the six history arrays bound from parameter `$first` onwards
fn history_rows(first: usize) -> String {
    format!(
        "unnest(${}::uuid[], ${}::int[], ${}::int[], ${}::int[], ${}::text[], ${}::timestamptz[]) \
         AS h(match_id, rating_before, rating_after, delta, reason, timestamp)",
        first,
        first + 1,
        first + 2,
        first + 3,
        first + 4,
        first + 5
    )
}

#[derive(Clone)]
pub struct DbClient {
    client: Arc<Client>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> std::result::Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(client)
        })
    }

    /// Creates every table the engine reads or writes, if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        info!("Ensuring database schema");
        self.client.batch_execute(include_str!("../../sql/schema.sql")).await?;
        Ok(())
    }

    pub fn client(&self) -> Arc<Client> {
        self.client.clone()
    }

    /// History rows of the given rankings, grouped by ranking and ordered oldest first
    async fn history_for(&self, ranking_ids: &[RankingId]) -> Result<HashMap<RankingId, Vec<HistoryRow>>> {
        if ranking_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = ranking_ids.to_vec();
        let rows = self
            .client
            .query(
                "SELECT ranking_id, match_id, rating_before, rating_after, delta, reason, timestamp
                 FROM ranking_history WHERE ranking_id = ANY($1) ORDER BY seq",
                &[&ids]
            )
            .await?;

        let mut history: HashMap<RankingId, Vec<HistoryRow>> = HashMap::new();
        for row in rows {
            let entry = HistoryRow::from_row(&row)?;
            history.entry(entry.ranking_id).or_default().push(entry);
        }

        Ok(history)
    }

    async fn records_from_rows(&self, rows: Vec<tokio_postgres::Row>) -> Result<Vec<RankingRecord>> {
        let ranking_rows = rows.iter().map(RankingRow::from_row).collect::<Result<Vec<_>>>()?;
        let ids = ranking_rows.iter().map(|r| r.id).collect_vec();
        let mut history = self.history_for(&ids).await?;

        ranking_rows
            .into_iter()
            .map(|r| {
                let entries = history.remove(&r.id).unwrap_or_default();
                r.into_record(entries)
            })
            .collect()
    }

    /// Inserts the full record with all of its history in one statement.
    /// Returns false if a record with the same id or (user, group) pair already exists.
    async fn insert_record(&self, row: &RankingRow, history: &[HistoryRow]) -> Result<bool> {
        let query = format!(
            "WITH inserted AS (
                INSERT INTO rankings ({RANKING_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
                ON CONFLICT DO NOTHING
                RETURNING id
             ), history AS (
                INSERT INTO ranking_history (ranking_id, match_id, rating_before, rating_after, delta, reason, timestamp)
                SELECT inserted.id, h.match_id, h.rating_before, h.rating_after, h.delta, h.reason, h.timestamp
                FROM inserted, {history}
             )
             SELECT id FROM inserted",
            history = history_rows(23)
        );

        let arrays = HistoryArrays::from(history);
        let values: &[&(dyn ToSql + Sync)] = &[
            &row.id,
            &row.user_id,
            &row.group_id,
            &row.mode,
            &row.rating,
            &row.peak,
            &row.points_total,
            &row.points_wins,
            &row.points_losses,
            &row.points_draws,
            &row.matches_played,
            &row.wins,
            &row.losses,
            &row.draws,
            &row.win_rate,
            &row.current_streak,
            &row.best_streak,
            &row.last_match_date,
            &row.is_active,
            &row.version,
            &row.created_at,
            &row.updated_at,
            &arrays.match_ids,
            &arrays.rating_before,
            &arrays.rating_after,
            &arrays.delta,
            &arrays.reason,
            &arrays.timestamp
        ];

        let rows = self.client.query(query.as_str(), values).await?;
        Ok(!rows.is_empty())
    }

    /// Version-checked update of the aggregate columns plus the newest history entry.
    /// Returns the new version, or None if the stored version differs or the row is missing.
    async fn update_record(&self, row: &RankingRow, newest: &[HistoryRow]) -> Result<Option<i64>> {
        let query = format!(
            "WITH updated AS (
                UPDATE rankings SET
                    rating = $5, peak = $6, points_total = $7, points_wins = $8, points_losses = $9,
                    points_draws = $10, matches_played = $11, wins = $12, losses = $13, draws = $14,
                    win_rate = $15, current_streak = $16, best_streak = $17, last_match_date = $18,
                    is_active = $19, updated_at = $21, version = version + 1
                WHERE id = $1 AND user_id = $2 AND group_id = $3 AND mode = $4 AND version = $20
                RETURNING id, version
             ), history AS (
                INSERT INTO ranking_history (ranking_id, match_id, rating_before, rating_after, delta, reason, timestamp)
                SELECT updated.id, h.match_id, h.rating_before, h.rating_after, h.delta, h.reason, h.timestamp
                FROM updated, {history}
                ON CONFLICT (ranking_id, match_id) DO NOTHING
             )
             SELECT version FROM updated",
            history = history_rows(22)
        );

        let arrays = HistoryArrays::from(newest);
        let values: &[&(dyn ToSql + Sync)] = &[
            &row.id,
            &row.user_id,
            &row.group_id,
            &row.mode,
            &row.rating,
            &row.peak,
            &row.points_total,
            &row.points_wins,
            &row.points_losses,
            &row.points_draws,
            &row.matches_played,
            &row.wins,
            &row.losses,
            &row.draws,
            &row.win_rate,
            &row.current_streak,
            &row.best_streak,
            &row.last_match_date,
            &row.is_active,
            &row.version,
            &row.updated_at,
            &arrays.match_ids,
            &arrays.rating_before,
            &arrays.rating_after,
            &arrays.delta,
            &arrays.reason,
            &arrays.timestamp
        ];

        let rows = self.client.query(query.as_str(), values).await?;
        match rows.first() {
            Some(r) => Ok(Some(r.try_get("version")?)),
            None => Ok(None)
        }
    }
}

/// Column-wise history, bound as Postgres arrays and expanded with `unnest`
struct HistoryArrays {
    match_ids: Vec<MatchId>,
    rating_before: Vec<Option<i32>>,
    rating_after: Vec<Option<i32>>,
    delta: Vec<i32>,
    reason: Vec<Option<String>>,
    timestamp: Vec<DateTime<Utc>>
}

impl From<&[HistoryRow]> for HistoryArrays {
    fn from(rows: &[HistoryRow]) -> Self {
        HistoryArrays {
            match_ids: rows.iter().map(|h| h.match_id).collect(),
            rating_before: rows.iter().map(|h| h.rating_before).collect(),
            rating_after: rows.iter().map(|h| h.rating_after).collect(),
            delta: rows.iter().map(|h| h.delta).collect(),
            reason: rows.iter().map(|h| h.reason.clone()).collect(),
            timestamp: rows.iter().map(|h| h.timestamp).collect()
        }
    }
}

#[async_trait]
impl RankingStore for DbClient {
    async fn get(&self, user_id: UserId, group_id: GroupId) -> Result<Option<RankingRecord>> {
        let query = format!("SELECT {RANKING_COLUMNS} FROM rankings WHERE user_id = $1 AND group_id = $2");
        let rows = self.client.query(query.as_str(), &[&user_id, &group_id]).await?;

        Ok(self.records_from_rows(rows).await?.into_iter().next())
    }

    async fn insert_if_absent(&self, record: RankingRecord) -> Result<RankingRecord> {
        let row = RankingRow::from_record(&record);
        let history = HistoryRow::from_record(&record);

        if self.insert_record(&row, &history).await? {
            debug!(user_id = %record.user_id, group_id = %record.group_id, "Ranking created");
            return Ok(record);
        }

        let winner = self.get(record.user_id, record.group_id).await?;
        settle_lost_insert(&record, winner)
    }

    async fn upsert(&self, record: &RankingRecord) -> Result<UpsertOutcome> {
        let row = RankingRow::from_record(record);
        let history = HistoryRow::from_record(record);
        let newest = match newest_match_id(record) {
            Some(match_id) => history.iter().filter(|h| h.match_id == match_id).cloned().collect_vec(),
            None => Vec::new()
        };

        if let Some(version) = self.update_record(&row, &newest).await? {
            let mut written = record.clone();
            written.version = version;
            return Ok(UpsertOutcome::Written(written));
        }

        // Nothing matched: either the row is missing entirely or its version moved on
        let mut fresh = row.clone();
        fresh.version = record.version + 1;

        if self.insert_record(&fresh, &history).await? {
            let mut written = record.clone();
            written.version = fresh.version;
            return Ok(UpsertOutcome::Written(written));
        }

        debug!(user_id = %record.user_id, version = record.version, "Version conflict on ranking write");
        Ok(UpsertOutcome::Conflict)
    }

    async fn count_with_better_value(&self, group_id: GroupId, sort_field: SortField, value: i64) -> Result<u64> {
        let query = format!(
            "SELECT COUNT(*) AS n FROM rankings WHERE group_id = $1 AND is_active AND {col} > $2::BIGINT",
            col = sort_field.column()
        );
        let row = self.client.query_one(query.as_str(), &[&group_id, &value]).await?;
        let count: i64 = row.try_get("n")?;

        Ok(count as u64)
    }

    async fn list_by_group(
        &self,
        group_id: GroupId,
        sort_field: SortField,
        page: u32,
        page_size: u32
    ) -> Result<(Vec<RankingRecord>, u64)> {
        let col = sort_field.column();

        let count_query =
            format!("SELECT COUNT(*) AS n FROM rankings WHERE group_id = $1 AND is_active AND {col} IS NOT NULL");
        let total: i64 = self.client.query_one(count_query.as_str(), &[&group_id]).await?.try_get("n")?;

        let query = format!(
            "SELECT {RANKING_COLUMNS} FROM rankings
             WHERE group_id = $1 AND is_active AND {col} IS NOT NULL
             ORDER BY {col} DESC, created_at ASC, id ASC
             LIMIT $2 OFFSET $3"
        );
        let limit = page_size as i64;
        let offset = page_offset(page, page_size) as i64;
        let rows = self.client.query(query.as_str(), &[&group_id, &limit, &offset]).await?;

        Ok((self.records_from_rows(rows).await?, total as u64))
    }

    async fn modes_in_group(&self, group_id: GroupId) -> Result<Vec<RankingMode>> {
        let rows = self
            .client
            .query("SELECT DISTINCT mode FROM rankings WHERE group_id = $1", &[&group_id])
            .await?;

        rows.iter()
            .map(|row| {
                let mode: i16 = row.try_get("mode")?;
                RankingMode::try_from(mode)
                    .map_err(|_| RankingError::PersistenceFailure(format!("Unknown ranking mode {}", mode)))
            })
            .collect()
    }
}

#[async_trait]
impl MatchProvider for DbClient {
    async fn get_match(&self, match_id: MatchId) -> Result<Option<MatchSnapshot>> {
        let Some(row) = self
            .client
            .query_opt(
                "SELECT id, group_id, status, is_ranked, team_count, winner, completed_at FROM matches WHERE id = $1",
                &[&match_id]
            )
            .await?
        else {
            return Ok(None);
        };

        let status: i16 = row.try_get("status")?;
        let status = MatchStatus::try_from(status)
            .map_err(|_| RankingError::invalid_match(match_id, format!("unknown status {}", status)))?;
        let team_count: i32 = row.try_get("team_count")?;
        let winner: Option<i32> = row.try_get("winner")?;

        let mut teams: Vec<Team> = (0..team_count.max(0)).map(|_| Team { players: Vec::new() }).collect();

        let players = self
            .client
            .query(
                "SELECT team_index, user_id, kills, deaths, assists FROM match_players
                 WHERE match_id = $1 ORDER BY team_index, position",
                &[&match_id]
            )
            .await?;

        for p in players {
            let team_index: i32 = p.try_get("team_index")?;
            let kills: Option<i32> = p.try_get("kills")?;
            let deaths: Option<i32> = p.try_get("deaths")?;
            let assists: Option<i32> = p.try_get("assists")?;
            let stats = (kills.is_some() || deaths.is_some() || assists.is_some()).then_some(PlayerMatchStats {
                kills,
                deaths,
                assists
            });

            let team = usize::try_from(team_index)
                .ok()
                .and_then(|i| teams.get_mut(i))
                .ok_or_else(|| RankingError::invalid_match(match_id, format!("player on unknown team {}", team_index)))?;

            team.players.push(TeamPlayer {
                user_id: p.try_get("user_id")?,
                stats
            });
        }

        Ok(Some(MatchSnapshot {
            id: row.try_get("id")?,
            group_id: row.try_get("group_id")?,
            status,
            is_ranked: row.try_get("is_ranked")?,
            teams,
            // A negative winner index can never be valid; surface it as out of range
            winner: winner.map(|w| usize::try_from(w).unwrap_or(usize::MAX)),
            completed_at: row.try_get("completed_at")?
        }))
    }

    async fn completed_ranked_matches(&self, group_id: GroupId) -> Result<Vec<MatchId>> {
        let rows = self
            .client
            .query(
                "SELECT id FROM matches
                 WHERE group_id = $1 AND status = $2 AND is_ranked
                 ORDER BY completed_at ASC NULLS LAST, id ASC",
                &[&group_id, &(MatchStatus::Completed as i16)]
            )
            .await?;

        rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
    }
}

#[async_trait]
impl GroupProvider for DbClient {
    async fn get_group_ranking_config(&self, group_id: GroupId) -> Result<Option<GroupRankingConfig>> {
        let Some(row) = self
            .client
            .query_opt(
                "SELECT ranking_mode, k_factor, initial_rating, min_rating, max_rating, win_points, loss_points,
                        draw_points, kill_points, death_points, assist_points
                 FROM groups WHERE id = $1",
                &[&group_id]
            )
            .await?
        else {
            return Ok(None);
        };

        let mode: i16 = row.try_get("ranking_mode")?;
        let mode = RankingMode::try_from(mode)
            .map_err(|_| RankingError::PersistenceFailure(format!("Group {} has unknown ranking mode {}", group_id, mode)))?;

        Ok(Some(GroupRankingConfig {
            mode,
            elo: EloSettings {
                k_factor: row.try_get("k_factor")?,
                initial_rating: row.try_get("initial_rating")?,
                min_rating: row.try_get("min_rating")?,
                max_rating: row.try_get("max_rating")?
            },
            points: PointsSettings {
                win_points: row.try_get("win_points")?,
                loss_points: row.try_get("loss_points")?,
                draw_points: row.try_get("draw_points")?,
                kill_points: row.try_get("kill_points")?,
                death_points: row.try_get("death_points")?,
                assist_points: row.try_get("assist_points")?
            }
        }))
    }
}

#[async_trait]
impl UserProvider for DbClient {
    async fn get_profiles(&self, user_ids: &[UserId]) -> Result<HashMap<UserId, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = user_ids.to_vec();
        let rows = self
            .client
            .query("SELECT id, username, display_name FROM users WHERE id = ANY($1)", &[&ids])
            .await?;

        rows.iter()
            .map(|r| {
                let profile = UserProfile {
                    user_id: r.try_get("id")?,
                    username: r.try_get("username")?,
                    display_name: r.try_get("display_name")?
                };
                Ok((profile.user_id, profile))
            })
            .collect()
    }
}
