use std::collections::HashMap;

use crate::{
    error::{RankingError, Result},
    model::structures::{
        adjustment::{PlannedAdjustment, RatingDelta},
        group_ranking_config::GroupRankingConfig,
        match_outcome::MatchOutcome,
        match_snapshot::MatchSnapshot,
        ranking_mode::RankingMode,
        UserId
    }
};

pub mod constants;
pub mod elo;
pub mod points;
pub mod stats;
pub mod structures;

/// # Match planning
///
/// Computes every participant's adjustment for one match without touching storage.
///
/// `pre_match_ratings` must hold every participant's rating as it was before this
/// match (only consulted in ELO mode). Each player's delta is computed against that
/// snapshot alone, so the result does not depend on the order players are visited
/// or written in.
///
/// Fails with `InvalidMatchForRanking` when the match is structurally unusable,
/// when an ELO team has nobody to play against, or when a player's points
/// do not fit in an `i32`.
pub fn plan_match(
    snapshot: &MatchSnapshot,
    config: &GroupRankingConfig,
    pre_match_ratings: &HashMap<UserId, i32>
) -> Result<Vec<PlannedAdjustment>> {
    if let Some(reason) = snapshot.structural_problem() {
        return Err(RankingError::invalid_match(snapshot.id, reason));
    }

    let mut planned = Vec::new();
    for (team_index, player) in snapshot.participants() {
        let outcome = MatchOutcome::for_team(team_index, snapshot.winner);

        let delta = match config.mode {
            RankingMode::Elo => {
                let rating = lookup(pre_match_ratings, snapshot, player.user_id)?;
                let opponents = snapshot
                    .opponents_of(team_index)
                    .map(|o| lookup(pre_match_ratings, snapshot, o.user_id))
                    .collect::<Result<Vec<i32>>>()?;

                let (expected_score, delta) = elo::compute(rating, &opponents, outcome, &config.elo)
                    .ok_or_else(|| {
                        RankingError::invalid_match(snapshot.id, format!("team {} has no opponents", team_index))
                    })?;

                RatingDelta::Elo {
                    rating_before: rating,
                    expected_score,
                    delta
                }
            }
            RankingMode::Points => RatingDelta::Points {
                delta: points::points_delta(outcome, player.stats.as_ref(), &config.points).ok_or_else(|| {
                    RankingError::invalid_match(
                        snapshot.id,
                        format!("points for user {} overflow", player.user_id)
                    )
                })?
            }
        };

        planned.push(PlannedAdjustment {
            user_id: player.user_id,
            team_index,
            outcome,
            delta
        });
    }

    Ok(planned)
}

fn lookup(ratings: &HashMap<UserId, i32>, snapshot: &MatchSnapshot, user_id: UserId) -> Result<i32> {
    ratings.get(&user_id).copied().ok_or_else(|| {
        RankingError::invalid_match(snapshot.id, format!("no pre-match rating for user {}", user_id))
    })
}
