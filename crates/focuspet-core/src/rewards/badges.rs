//! Achievement badges.
//!
//! The catalog is static: each [`BadgeId`] maps to a definition with a
//! single [`BadgeCondition`]. Only the unlock state is persisted, and it
//! only ever moves from locked to unlocked.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::{Counters, Streak};
use crate::catch_up::local_day;
use crate::pet::{Pet, MAX_LEVEL};
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Completion,
    Streak,
    Consistency,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// Aggregate that unlocks a badge once it reaches a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeCondition {
    CompletedTasks(u32),
    StreakDays(u32),
    VerifiedCheckIns(u32),
    ConsecutiveCheckIns(u32),
    PerfectTasks(u32),
    /// A successful task lasting at least this many hours.
    LongTask { hours: u32 },
    /// Successful tasks started on one calendar day.
    TasksInOneDay(u32),
    PetTypesOwned(u32),
    MaxLevelPet,
    /// A pet created after another one died.
    PetAfterDeath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeId {
    FirstStep,
    Apprentice,
    Student,
    Expert,
    Master,
    Legend,
    StreakStarter,
    PerfectWeek,
    TwoWeeks,
    OneMonth,
    FiftyDays,
    Centennial,
    Unstoppable,
    Punctual,
    Precise,
    Flawless,
    NoMisses,
    SteadyRhythm,
    PeakEfficiency,
    PetMaster,
    Collector,
    Survivor,
    Invincible,
    Phoenix,
    TotalDedication,
    Speedster,
    TimeMaster,
}

/// Static part of a badge.
#[derive(Debug, Clone, Copy)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub category: BadgeCategory,
    pub rarity: BadgeRarity,
    pub points: u32,
    pub condition: BadgeCondition,
}

macro_rules! badge {
    ($id:ident, $name:expr, $desc:expr, $cat:ident, $rarity:ident, $points:expr, $cond:expr) => {
        BadgeDefinition {
            id: BadgeId::$id,
            name: $name,
            description: $desc,
            category: BadgeCategory::$cat,
            rarity: BadgeRarity::$rarity,
            points: $points,
            condition: $cond,
        }
    };
}

use BadgeCondition::*;

pub static CATALOG: [BadgeDefinition; 27] = [
    badge!(FirstStep, "First Step", "Complete your first task", Completion, Common, 10, CompletedTasks(1)),
    badge!(Apprentice, "Apprentice", "Complete 5 tasks", Completion, Common, 15, CompletedTasks(5)),
    badge!(Student, "Student", "Complete 10 tasks", Completion, Rare, 25, CompletedTasks(10)),
    badge!(Expert, "Expert", "Complete 25 tasks", Completion, Rare, 50, CompletedTasks(25)),
    badge!(Master, "Master", "Complete 50 tasks", Completion, Epic, 100, CompletedTasks(50)),
    badge!(Legend, "Legend", "Complete 100 tasks", Completion, Legendary, 250, CompletedTasks(100)),
    badge!(StreakStarter, "Getting Started", "3 consecutive days", Streak, Common, 15, StreakDays(3)),
    badge!(PerfectWeek, "Perfect Week", "7 consecutive days", Streak, Rare, 30, StreakDays(7)),
    badge!(TwoWeeks, "Two Weeks", "14 consecutive days", Streak, Rare, 50, StreakDays(14)),
    badge!(OneMonth, "One Month", "30 consecutive days", Streak, Epic, 100, StreakDays(30)),
    badge!(FiftyDays, "Fifty Days", "50 consecutive days", Streak, Epic, 150, StreakDays(50)),
    badge!(Centennial, "Centennial", "100 consecutive days", Streak, Legendary, 300, StreakDays(100)),
    badge!(Unstoppable, "Unstoppable", "200 consecutive days", Streak, Legendary, 500, StreakDays(200)),
    badge!(Punctual, "Punctual", "10 check-ins on time", Consistency, Common, 20, VerifiedCheckIns(10)),
    badge!(Precise, "Precise", "25 check-ins on time", Consistency, Rare, 40, VerifiedCheckIns(25)),
    badge!(Flawless, "Flawless", "50 check-ins on time", Consistency, Epic, 75, VerifiedCheckIns(50)),
    badge!(NoMisses, "No Misses", "100 check-ins on time", Consistency, Legendary, 200, VerifiedCheckIns(100)),
    badge!(SteadyRhythm, "Steady Rhythm", "10 successful check-ins in a row", Consistency, Rare, 35, ConsecutiveCheckIns(10)),
    badge!(PeakEfficiency, "Peak Efficiency", "25 successful check-ins in a row", Consistency, Epic, 80, ConsecutiveCheckIns(25)),
    badge!(PetMaster, "Pet Master", "Raise a pet to level 25", Special, Legendary, 300, MaxLevelPet),
    badge!(Collector, "Collector", "Own 5 different pet types", Special, Rare, 60, PetTypesOwned(5)),
    badge!(Survivor, "Survivor", "Finish a task without missing a check-in", Special, Rare, 40, PerfectTasks(1)),
    badge!(Invincible, "Invincible", "Finish 10 tasks without missing a check-in", Special, Epic, 150, PerfectTasks(10)),
    badge!(Phoenix, "Phoenix", "Adopt a new pet after one died", Special, Epic, 80, PetAfterDeath),
    badge!(TotalDedication, "Total Dedication", "Finish an 8 hour task", Special, Epic, 100, LongTask { hours: 8 }),
    badge!(Speedster, "Speedster", "Finish 5 tasks in a single day", Special, Legendary, 200, TasksInOneDay(5)),
    badge!(TimeMaster, "Time Master", "100 check-ins in total", Special, Legendary, 250, VerifiedCheckIns(100)),
];

impl BadgeId {
    pub fn definition(self) -> &'static BadgeDefinition {
        // every id has exactly one catalog entry (checked in tests)
        CATALOG
            .iter()
            .find(|d| d.id == self)
            .unwrap_or(&CATALOG[0])
    }

    /// Stable snake_case key, as persisted.
    pub fn key(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// Persisted unlock state of one badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: BadgeId,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Badge {
    pub fn locked(id: BadgeId) -> Self {
        Badge {
            id,
            unlocked: false,
            unlocked_at: None,
        }
    }

    pub fn definition(&self) -> &'static BadgeDefinition {
        self.id.definition()
    }

    pub fn view(&self) -> BadgeView {
        let def = self.definition();
        BadgeView {
            id: self.id,
            name: def.name,
            description: def.description,
            category: def.category,
            rarity: def.rarity,
            points: def.points,
            unlocked: self.unlocked,
            unlocked_at: self.unlocked_at,
        }
    }
}

/// Badge with its definition, for display.
#[derive(Debug, Clone, Serialize)]
pub struct BadgeView {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub category: BadgeCategory,
    pub rarity: BadgeRarity,
    pub points: u32,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Deserialize a persisted badge list, dropping ids the catalog no longer has.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Vec<Badge>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Badge>(v).ok())
        .collect())
}

/// Full catalog in order, carrying over unlock state from `saved`.
pub fn merge_with_catalog(saved: &[Badge]) -> Vec<Badge> {
    let unlocked: HashMap<BadgeId, &Badge> = saved
        .iter()
        .filter(|b| b.unlocked)
        .map(|b| (b.id, b))
        .collect();
    CATALOG
        .iter()
        .map(|def| match unlocked.get(&def.id) {
            Some(b) => (*b).clone(),
            None => Badge::locked(def.id),
        })
        .collect()
}

/// Aggregates the catalog conditions are checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeStats {
    pub completed_tasks: u32,
    pub streak_days: u32,
    pub verified_check_ins: u32,
    pub consecutive_check_ins: u32,
    pub perfect_tasks: u32,
    pub longest_task_secs: i64,
    pub max_tasks_in_one_day: u32,
    pub pet_types_owned: u32,
    pub has_max_level_pet: bool,
    pub pet_after_death: bool,
}

impl BadgeStats {
    pub fn collect(
        tasks: &[Task],
        pets: &[Pet],
        streak: &Streak,
        counters: &Counters,
        offset: FixedOffset,
    ) -> Self {
        let successful: Vec<&Task> = tasks.iter().filter(|t| t.counts_as_success()).collect();

        let mut per_day: HashMap<NaiveDate, u32> = HashMap::new();
        for task in &successful {
            if let Some(start) = task.start_time {
                *per_day.entry(local_day(start, offset)).or_default() += 1;
            }
        }

        let types: BTreeSet<_> = pets.iter().map(|p| p.pet_type).collect();
        let pet_after_death = pets.iter().any(|newer| {
            newer.created_at.is_some_and(|created| {
                pets.iter()
                    .any(|older| older.id != newer.id && older.death_at.is_some_and(|d| d <= created))
            })
        });

        BadgeStats {
            completed_tasks: counters.completed_tasks,
            streak_days: streak.current,
            verified_check_ins: counters.successful_check_ins,
            consecutive_check_ins: counters.consecutive_successful_check_ins,
            perfect_tasks: successful
                .iter()
                .filter(|t| t.completion_rate() >= 1.0)
                .count() as u32,
            longest_task_secs: successful.iter().map(|t| t.duration_secs).max().unwrap_or(0),
            max_tasks_in_one_day: per_day.values().copied().max().unwrap_or(0),
            pet_types_owned: types.len() as u32,
            has_max_level_pet: pets.iter().any(|p| p.level >= MAX_LEVEL),
            pet_after_death,
        }
    }

    pub fn satisfies(&self, condition: BadgeCondition) -> bool {
        match condition {
            CompletedTasks(n) => self.completed_tasks >= n,
            StreakDays(n) => self.streak_days >= n,
            VerifiedCheckIns(n) => self.verified_check_ins >= n,
            ConsecutiveCheckIns(n) => self.consecutive_check_ins >= n,
            PerfectTasks(n) => self.perfect_tasks >= n,
            LongTask { hours } => self.longest_task_secs >= i64::from(hours) * 3600,
            TasksInOneDay(n) => self.max_tasks_in_one_day >= n,
            PetTypesOwned(n) => self.pet_types_owned >= n,
            MaxLevelPet => self.has_max_level_pet,
            PetAfterDeath => self.pet_after_death,
        }
    }
}

/// Unlock every locked badge whose condition now holds. Returns the newly
/// unlocked ids; already unlocked badges are never touched.
pub fn evaluate(badges: &mut [Badge], stats: &BadgeStats, now: DateTime<Utc>) -> Vec<BadgeId> {
    let mut unlocked = Vec::new();
    for badge in badges.iter_mut().filter(|b| !b.unlocked) {
        if stats.satisfies(badge.definition().condition) {
            badge.unlocked = true;
            badge.unlocked_at = Some(now);
            debug!(badge = ?badge.id, "badge unlocked");
            unlocked.push(badge.id);
        }
    }
    unlocked
}
