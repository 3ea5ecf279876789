use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

/// How a group ranks its members. Fixed per record at creation time.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum RankingMode {
    Elo = 0,
    Points = 1
}

impl RankingMode {
    /// The leaderboard column a group in this mode is sorted by
    pub fn sort_field(&self) -> SortField {
        match self {
            RankingMode::Elo => SortField::Rating,
            RankingMode::Points => SortField::Total
        }
    }
}

impl TryFrom<i16> for RankingMode {
    type Error = ();

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(RankingMode::Elo),
            1 => Ok(RankingMode::Points),
            _ => Err(())
        }
    }
}

/// Primary sort value of a leaderboard. Always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Rating,
    Total
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Rating => "rating",
            SortField::Total => "points_total"
        }
    }
}
