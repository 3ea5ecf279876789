use crate::model::structures::{match_outcome::MatchOutcome, ranking_record::RankingStats};
use chrono::{DateTime, Utc};

impl RankingStats {
    /// Counts one finished match: outcome counters, streaks, win rate and last match date.
    pub fn record(&mut self, outcome: MatchOutcome, completed_at: DateTime<Utc>) {
        self.matches_played += 1;

        match outcome {
            MatchOutcome::Win => {
                self.wins += 1;
                self.current_streak = if self.current_streak > 0 {
                    self.current_streak + 1
                } else {
                    1
                };
            }
            MatchOutcome::Loss => {
                self.losses += 1;
                self.current_streak = if self.current_streak < 0 {
                    self.current_streak - 1
                } else {
                    -1
                };
            }
            MatchOutcome::Draw => {
                self.draws += 1;
                self.current_streak = 0;
            }
        }

        self.best_streak = self.best_streak.max(self.current_streak.abs());
        self.win_rate = win_rate(self.wins, self.matches_played);
        self.last_match_date = Some(completed_at);
    }
}

pub fn win_rate(wins: i32, matches_played: i32) -> f64 {
    if matches_played <= 0 {
        return 0.0;
    }

    wins as f64 / matches_played as f64
}
