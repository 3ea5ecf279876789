use super::{GroupId, MatchId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{collections::HashSet, convert::TryFrom};

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MatchStatus {
    Pending = 0,
    InProgress = 1,
    Completed = 2,
    Cancelled = 3
}

impl TryFrom<i16> for MatchStatus {
    type Error = ();

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(MatchStatus::Pending),
            1 => Ok(MatchStatus::InProgress),
            2 => Ok(MatchStatus::Completed),
            3 => Ok(MatchStatus::Cancelled),
            _ => Err(())
        }
    }
}

/// Immutable view of a match, taken once when a result is applied.
/// Nothing downstream reads the match provider again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: MatchId,
    pub group_id: GroupId,
    pub status: MatchStatus,
    pub is_ranked: bool,
    pub teams: Vec<Team>,
    /// Index into `teams`. `None` is a draw for every team.
    pub winner: Option<usize>,
    pub completed_at: Option<DateTime<Utc>>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub players: Vec<TeamPlayer>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPlayer {
    pub user_id: UserId,
    pub stats: Option<PlayerMatchStats>
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMatchStats {
    pub kills: Option<i32>,
    pub deaths: Option<i32>,
    pub assists: Option<i32>
}

impl MatchSnapshot {
    /// Every participant with the index of their team, in team order
    pub fn participants(&self) -> impl Iterator<Item = (usize, &TeamPlayer)> {
        self.teams
            .iter()
            .enumerate()
            .flat_map(|(i, team)| team.players.iter().map(move |p| (i, p)))
    }

    /// Players on every team other than `team_index`
    pub fn opponents_of(&self, team_index: usize) -> impl Iterator<Item = &TeamPlayer> {
        self.teams
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != team_index)
            .flat_map(|(_, team)| team.players.iter())
    }

    /// Returns a description of the first structural problem, if any.
    /// Opponent availability is mode-specific and checked by the ELO planner.
    pub fn structural_problem(&self) -> Option<String> {
        if self.status != MatchStatus::Completed {
            return Some(format!("match status is {:?}, expected Completed", self.status));
        }

        if !self.is_ranked {
            return Some("match is not ranked".to_string());
        }

        if self.teams.is_empty() || self.teams.iter().all(|t| t.players.is_empty()) {
            return Some("match has no players".to_string());
        }

        if let Some(winner) = self.winner {
            if winner >= self.teams.len() {
                return Some(format!(
                    "winner index {} is out of range for {} teams",
                    winner,
                    self.teams.len()
                ));
            }
        }

        let mut seen = HashSet::new();
        for (_, player) in self.participants() {
            if !seen.insert(player.user_id) {
                return Some(format!("user {} appears more than once", player.user_id));
            }
        }

        None
    }
}
