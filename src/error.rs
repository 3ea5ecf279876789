use crate::model::structures::{ranking_mode::RankingMode, GroupId, MatchId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Match {match_id} cannot be ranked: {reason}")]
    InvalidMatchForRanking { match_id: MatchId, reason: String },

    #[error("Ranking for user {user_id} in group {group_id} already exists")]
    AlreadyExists { user_id: UserId, group_id: GroupId },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Group {group_id} ranks by {group_mode:?} but has records in {record_mode:?} mode")]
    ModeMismatch {
        group_id: GroupId,
        record_mode: RankingMode,
        group_mode: RankingMode
    },

    #[error("Invalid pagination: page {page}, page size {page_size}")]
    InvalidPagination { page: u32, page_size: u32 },

    #[error("Group {group_id} has an unusable ranking configuration: {reason}")]
    InvalidGroupConfig { group_id: GroupId, reason: String }
}

impl RankingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        RankingError::NotFound {
            entity,
            id: id.to_string()
        }
    }

    pub fn invalid_match(match_id: MatchId, reason: impl Into<String>) -> Self {
        RankingError::InvalidMatchForRanking {
            match_id,
            reason: reason.into()
        }
    }

    /// Store I/O failures and unreconciled concurrent inserts are worth retrying.
    /// Everything else points at bad input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RankingError::PersistenceFailure(_) | RankingError::AlreadyExists { .. }
        )
    }
}

impl From<tokio_postgres::Error> for RankingError {
    fn from(e: tokio_postgres::Error) -> Self {
        RankingError::PersistenceFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RankingError>;
