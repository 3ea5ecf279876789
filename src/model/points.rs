use crate::model::structures::{
    group_ranking_config::PointsSettings, match_outcome::MatchOutcome, match_snapshot::PlayerMatchStats
};

/// Base points for the outcome plus any configured per-statistic bonus.
/// Not clamped: totals may go negative. `None` if the sum overflows `i32`.
pub fn points_delta(outcome: MatchOutcome, stats: Option<&PlayerMatchStats>, settings: &PointsSettings) -> Option<i32> {
    let base = match outcome {
        MatchOutcome::Win => settings.win_points,
        MatchOutcome::Loss => settings.loss_points,
        MatchOutcome::Draw => settings.draw_points
    };

    match stats {
        Some(s) => base.checked_add(bonus(s, settings)?),
        None => Some(base)
    }
}

fn bonus(stats: &PlayerMatchStats, settings: &PointsSettings) -> Option<i32> {
    [
        (stats.kills, settings.kill_points),
        (stats.deaths, settings.death_points),
        (stats.assists, settings.assist_points)
    ]
    .into_iter()
    .filter_map(|(value, multiplier)| Some((value?, multiplier?)))
    .try_fold(0i32, |total, (value, multiplier)| total.checked_add(value.checked_mul(multiplier)?))
}
