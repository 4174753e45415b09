//! Day streak of successful task completions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Experience multiplier earned by keeping a streak alive.
pub fn xp_multiplier(streak_days: u32) -> f64 {
    match streak_days {
        0..=6 => 1.0,
        7..=13 => 1.5,
        14..=29 => 2.0,
        _ => 2.5,
    }
}

/// What a streak update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    /// Already counted today.
    Unchanged,
    /// Continued from yesterday.
    Extended,
    /// First activity, or the streak had been broken.
    Restarted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    #[serde(default)]
    pub current: u32,
    #[serde(default)]
    pub longest: u32,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_days: u32,
}

impl Streak {
    /// Record a successful completion on `today`.
    pub fn update(&mut self, today: NaiveDate) -> StreakUpdate {
        let outcome = match self.last_activity_date {
            None => StreakUpdate::Restarted,
            Some(last) => match (today - last).num_days() {
                0 => return StreakUpdate::Unchanged,
                1 => StreakUpdate::Extended,
                diff if diff < 0 => {
                    warn!(%last, %today, "activity date precedes last streak day; ignoring");
                    return StreakUpdate::Unchanged;
                }
                _ => StreakUpdate::Restarted,
            },
        };
        self.current = match outcome {
            StreakUpdate::Extended => self.current + 1,
            _ => 1,
        };
        self.longest = self.longest.max(self.current);
        self.last_activity_date = Some(today);
        self.total_days += 1;
        outcome
    }

    pub fn multiplier(&self) -> f64 {
        xp_multiplier(self.current)
    }
}
