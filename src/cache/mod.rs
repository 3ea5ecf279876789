pub mod backend;
pub mod leaderboard_cache;

pub use backend::{CacheStore, InMemoryCacheStore};
pub use leaderboard_cache::{CacheLookup, LeaderboardCache};
