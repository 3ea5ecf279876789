use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Result of a match from a single player's point of view
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[serde(rename_all = "camelCase")]
pub enum MatchOutcome {
    Win,
    Draw,
    Loss
}

impl MatchOutcome {
    /// Outcome for the team at `team_index` given the match winner.
    /// A missing winner is a draw for every team.
    pub fn for_team(team_index: usize, winner: Option<usize>) -> MatchOutcome {
        match winner {
            None => MatchOutcome::Draw,
            Some(w) if w == team_index => MatchOutcome::Win,
            Some(_) => MatchOutcome::Loss
        }
    }

    /// Actual score S used by the ELO update
    pub fn score(&self) -> f64 {
        match self {
            MatchOutcome::Win => 1.0,
            MatchOutcome::Draw => 0.5,
            MatchOutcome::Loss => 0.0
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            MatchOutcome::Win => "Win",
            MatchOutcome::Draw => "Draw",
            MatchOutcome::Loss => "Loss"
        }
    }
}
