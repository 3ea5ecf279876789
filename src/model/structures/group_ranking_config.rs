use crate::model::{
    constants::{
        DEFAULT_DRAW_POINTS, DEFAULT_INITIAL_RATING, DEFAULT_K_FACTOR, DEFAULT_LOSS_POINTS, DEFAULT_MAX_RATING,
        DEFAULT_MIN_RATING, DEFAULT_WIN_POINTS
    },
    structures::ranking_mode::RankingMode
};
use serde::{Deserialize, Serialize};

/// Ranking configuration owned by a group. Read-only to the ranking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRankingConfig {
    pub mode: RankingMode,
    #[serde(default)]
    pub elo: EloSettings,
    #[serde(default)]
    pub points: PointsSettings
}

impl GroupRankingConfig {
    pub fn elo(settings: EloSettings) -> GroupRankingConfig {
        GroupRankingConfig {
            mode: RankingMode::Elo,
            elo: settings,
            points: PointsSettings::default()
        }
    }

    pub fn points(settings: PointsSettings) -> GroupRankingConfig {
        GroupRankingConfig {
            mode: RankingMode::Points,
            elo: EloSettings::default(),
            points: settings
        }
    }

    /// Describes why this configuration cannot rank matches, if it cannot.
    /// Only ELO groups are constrained; points settings accept any value.
    pub fn problem(&self) -> Option<String> {
        if self.mode != RankingMode::Elo {
            return None;
        }
        let elo = &self.elo;

        if elo.min_rating > elo.max_rating {
            return Some(format!(
                "min rating {} is above max rating {}",
                elo.min_rating, elo.max_rating
            ));
        }
        if !elo.k_factor.is_finite() || elo.k_factor < 0.0 {
            return Some(format!("k-factor {} must be finite and non-negative", elo.k_factor));
        }
        if !(elo.min_rating..=elo.max_rating).contains(&elo.initial_rating) {
            return Some(format!(
                "initial rating {} is outside [{}, {}]",
                elo.initial_rating, elo.min_rating, elo.max_rating
            ));
        }

        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EloSettings {
    pub k_factor: f64,
    pub initial_rating: i32,
    pub min_rating: i32,
    pub max_rating: i32
}

impl EloSettings {
    /// Never panics; with inverted bounds `max_rating` wins
    pub fn clamp(&self, rating: i32) -> i32 {
        rating.max(self.min_rating).min(self.max_rating)
    }
}

impl Default for EloSettings {
    fn default() -> Self {
        EloSettings {
            k_factor: DEFAULT_K_FACTOR,
            initial_rating: DEFAULT_INITIAL_RATING,
            min_rating: DEFAULT_MIN_RATING,
            max_rating: DEFAULT_MAX_RATING
        }
    }
}

/// Points awarded per outcome, plus optional per-statistic bonuses.
/// A bonus of `None` means the statistic is not scored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSettings {
    pub win_points: i32,
    pub loss_points: i32,
    pub draw_points: i32,
    pub kill_points: Option<i32>,
    pub death_points: Option<i32>,
    pub assist_points: Option<i32>
}

impl Default for PointsSettings {
    fn default() -> Self {
        PointsSettings {
            win_points: DEFAULT_WIN_POINTS,
            loss_points: DEFAULT_LOSS_POINTS,
            draw_points: DEFAULT_DRAW_POINTS,
            kill_points: None,
            death_points: None,
            assist_points: None
        }
    }
}
