// ELO defaults
pub const DEFAULT_K_FACTOR: f64 = 32.0;
pub const DEFAULT_INITIAL_RATING: i32 = 1200;
pub const DEFAULT_MIN_RATING: i32 = 0;
pub const DEFAULT_MAX_RATING: i32 = 3000;
/// Rating gap at which the stronger side is expected to score ten times as often
pub const ELO_SCALE: f64 = 400.0;
// Points defaults
pub const DEFAULT_WIN_POINTS: i32 = 3;
pub const DEFAULT_LOSS_POINTS: i32 = -1;
pub const DEFAULT_DRAW_POINTS: i32 = 1;
// Leaderboard
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;
