//! ELO rating update.
//!
//! `E = 1 / (1 + 10^((avg(O) - R) / 400))`, `delta = round(k * (S - E))`.
//! Rounding is `f64::round`, i.e. half away from zero: +0.5 becomes +1, -0.5 becomes -1.

use crate::model::{
    constants::ELO_SCALE,
    structures::{group_ranking_config::EloSettings, match_outcome::MatchOutcome}
};

/// Mean of the opponent ratings, `None` if there are no opponents
pub fn average_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }

    Some(ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64)
}

/// Expected score of a player rated `rating` against opponents averaging `opponent_average`
pub fn expected_score(rating: i32, opponent_average: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_average - rating as f64) / ELO_SCALE))
}

pub fn rating_delta(k_factor: f64, outcome: MatchOutcome, expected: f64) -> i32 {
    (k_factor * (outcome.score() - expected)).round() as i32
}

/// Returns `(expected_score, delta)` for one player, or `None` when there is
/// nobody to compare against.
pub fn compute(
    rating: i32,
    opponent_ratings: &[i32],
    outcome: MatchOutcome,
    settings: &EloSettings
) -> Option<(f64, i32)> {
    let average = average_rating(opponent_ratings)?;
    let expected = expected_score(rating, average);

    Some((expected, rating_delta(settings.k_factor, outcome, expected)))
}
