use super::backend::CacheStore;
use crate::{
    error::{RankingError, Result},
    model::structures::{leaderboard::Leaderboard, GroupId}
};
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// Result of a cache lookup. `key` is where a freshly computed page belongs;
/// it embeds the group version observed before the store was read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup {
    pub key: String,
    pub hit: Option<Leaderboard>
}

/// Read-through cache of leaderboard pages.
///
/// Page keys embed a per-group version counter. Invalidating a group bumps the
/// counter, so every page cached under an older version becomes unreachable and
/// ages out by TTL.
#[derive(Clone)]
pub struct LeaderboardCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration
}

impl LeaderboardCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn version_key(group_id: GroupId) -> String {
        format!("leaderboard:{}:version", group_id)
    }

    fn page_key(group_id: GroupId, version: i64, page: u32, page_size: u32) -> String {
        format!("leaderboard:{}:v{}:{}:{}", group_id, version, page, page_size)
    }

    async fn version(&self, group_id: GroupId) -> Result<i64> {
        let raw = self.store.get(&Self::version_key(group_id)).await?;

        Ok(raw
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0))
    }

    pub async fn lookup(&self, group_id: GroupId, page: u32, page_size: u32) -> Result<CacheLookup> {
        let version = self.version(group_id).await?;
        let key = Self::page_key(group_id, version, page, page_size);

        let hit = match self.store.get(&key).await? {
            Some(bytes) => match serde_json::from_slice::<Leaderboard>(&bytes) {
                Ok(leaderboard) => Some(leaderboard),
                Err(e) => {
                    debug!(key = %key, error = %e, "Discarding undecodable leaderboard cache entry");
                    None
                }
            },
            None => None
        };

        debug!(key = %key, hit = hit.is_some(), "Leaderboard cache lookup");
        Ok(CacheLookup { key, hit })
    }

    /// Caches the page and returns it decoded from the stored bytes, i.e. exactly
    /// what a later hit on `key` yields.
    pub async fn store(&self, key: &str, leaderboard: &Leaderboard) -> Result<Leaderboard> {
        let bytes = serde_json::to_vec(leaderboard)
            .map_err(|e| RankingError::PersistenceFailure(format!("Failed to encode leaderboard: {}", e)))?;
        let served = serde_json::from_slice::<Leaderboard>(&bytes)
            .map_err(|e| RankingError::PersistenceFailure(format!("Failed to decode leaderboard: {}", e)))?;

        self.store.set_with_ttl(key, bytes, self.ttl).await?;
        Ok(served)
    }

    /// Makes every cached page of the group unreachable. Returns the new version.
    pub async fn invalidate(&self, group_id: GroupId) -> Result<i64> {
        let version = self.store.incr(&Self::version_key(group_id)).await?;
        debug!(group_id = %group_id, version, "Leaderboard cache invalidated");

        Ok(version)
    }
}
