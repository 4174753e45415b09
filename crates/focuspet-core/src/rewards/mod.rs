//! Streaks, badges, currency and cumulative counters.

pub mod badges;
pub mod streak;

use serde::{Deserialize, Serialize};

pub use badges::{Badge, BadgeId, BadgeStats, BadgeView};
pub use streak::{Streak, StreakUpdate};

/// Base experience for a verified check-in.
pub const CHECK_IN_XP: u32 = 10;
/// Base experience for a successful task.
pub const TASK_XP: u32 = 20;

pub const CHECK_IN_COINS: u64 = 10;
pub const TASK_COINS: u64 = 50;
pub const BADGE_COINS: u64 = 100;

/// Virtual currency balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCurrency {
    #[serde(default)]
    pub coins: u64,
}

impl VirtualCurrency {
    pub fn credit(&mut self, amount: u64) {
        self.coins = self.coins.saturating_add(amount);
    }
}

/// Cumulative counters kept alongside the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Tasks that completed successfully.
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub successful_check_ins: u32,
    /// Verified check-ins since the last failed or missed one.
    #[serde(default)]
    pub consecutive_successful_check_ins: u32,
    #[serde(default)]
    pub total_points: u64,
}

impl Counters {
    pub fn record_verified(&mut self) {
        self.successful_check_ins += 1;
        self.consecutive_successful_check_ins += 1;
    }

    pub fn record_miss(&mut self) {
        self.consecutive_successful_check_ins = 0;
    }
}
