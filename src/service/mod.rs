pub mod providers;
pub mod ranking_service;

pub use providers::{GroupProvider, MatchProvider, UserProvider};
pub use ranking_service::{GroupProcessingSummary, MatchApplication, RankingService, ServiceConfig};
