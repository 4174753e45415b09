//! Companion vitality model.
//!
//! Pure mutation rules for a pet: feeding, neglect, experience and leveling,
//! and the one-way death transition. Nothing here reads the clock; every
//! timestamp is passed in by the caller.

pub mod deterioration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::rewards::streak::xp_multiplier;

pub const MAX_STAT: u32 = 100;
pub const MAX_LEVEL: u32 = 25;

const FEED_HEALTH: u32 = 10;
const FEED_HAPPINESS: u32 = 5;
const NEGLECT_HEALTH: u32 = 15;
const NEGLECT_HAPPINESS: u32 = 10;
const REWARD_HAPPINESS: u32 = 5;
const LEVEL_UP_HEALTH: u32 = 5;
const LEVEL_UP_HAPPINESS: u32 = 10;

/// Companion species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetType {
    Cat,
    Dog,
    Rabbit,
    Dragon,
    Unicorn,
    Phoenix,
    Robot,
    Alien,
}

impl PetType {
    pub const ALL: [PetType; 8] = [
        PetType::Cat,
        PetType::Dog,
        PetType::Rabbit,
        PetType::Dragon,
        PetType::Unicorn,
        PetType::Phoenix,
        PetType::Robot,
        PetType::Alien,
    ];

    pub fn is_premium(self) -> bool {
        !matches!(self, PetType::Cat | PetType::Dog | PetType::Rabbit)
    }

    /// List price in cents.
    pub fn price_cents(self) -> u32 {
        match self {
            PetType::Cat => 0,
            PetType::Dog | PetType::Rabbit => 199,
            PetType::Dragon | PetType::Unicorn | PetType::Robot => 299,
            PetType::Phoenix | PetType::Alien => 399,
        }
    }

    pub fn is_free(self) -> bool {
        self.price_cents() == 0
    }

    pub fn formatted_price(self) -> String {
        match self.price_cents() {
            0 => "free".to_string(),
            cents => format!("${}.{:02}", cents / 100, cents % 100),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PetType::Cat => "cat",
            PetType::Dog => "dog",
            PetType::Rabbit => "rabbit",
            PetType::Dragon => "dragon",
            PetType::Unicorn => "unicorn",
            PetType::Phoenix => "phoenix",
            PetType::Robot => "robot",
            PetType::Alien => "alien",
        }
    }
}

impl fmt::Display for PetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PetType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown pet type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Okay,
    Sick,
    Critical,
}

impl HealthStatus {
    pub fn from_health(health: u32) -> Self {
        match health {
            80.. => HealthStatus::Healthy,
            50..=79 => HealthStatus::Okay,
            20..=49 => HealthStatus::Sick,
            _ => HealthStatus::Critical,
        }
    }
}

/// Experience needed to go from `level` to `level + 1`: `floor(10 × level^1.5)`.
/// Levels past [`MAX_LEVEL`] are treated as `MAX_LEVEL`.
pub fn experience_required(level: u32) -> u32 {
    // floor(10 * l^1.5) == floor(sqrt(100 * l^3)), computed in integers
    let l = u64::from(level.min(MAX_LEVEL));
    let target = 100 * l * l * l;
    let mut root = (target as f64).sqrt() as u64;
    while root * root > target {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= target {
        root += 1;
    }
    root as u32
}

/// Result of a [`Pet::reward`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardOutcome {
    /// Experience actually credited after the streak multiplier.
    pub experience_gained: u32,
    pub levels_gained: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub name: String,
    pub pet_type: PetType,
    pub health: u32,
    pub happiness: u32,
    pub level: u32,
    pub experience: u32,
    #[serde(default)]
    pub consecutive_days: u32,
    #[serde(default)]
    pub last_fed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_deterioration_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_task_ids: BTreeSet<String>,
    #[serde(default)]
    pub death_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Pet {
    pub fn new(name: impl Into<String>, pet_type: PetType, now: DateTime<Utc>) -> Self {
        Pet {
            id: format!("pet-{}", uuid::Uuid::new_v4()),
            name: name.into(),
            pet_type,
            health: MAX_STAT,
            happiness: MAX_STAT,
            level: 1,
            experience: 0,
            consecutive_days: 0,
            last_fed_at: None,
            last_deterioration_at: None,
            completed_task_ids: BTreeSet::new(),
            death_at: None,
            created_at: Some(now),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0 && self.death_at.is_none()
    }

    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from_health(self.health)
    }

    pub fn experience_required(&self) -> u32 {
        experience_required(self.level)
    }

    pub fn is_max_level(&self) -> bool {
        self.level >= MAX_LEVEL
    }

    pub fn feed(&mut self, now: DateTime<Utc>) {
        if !self.is_alive() {
            return;
        }
        self.health = (self.health + FEED_HEALTH).min(MAX_STAT);
        self.happiness = (self.happiness + FEED_HAPPINESS).min(MAX_STAT);
        self.last_fed_at = Some(now);
        self.last_deterioration_at = None;
    }

    /// Apply one neglect penalty. Returns `true` if this call killed the pet.
    pub fn neglect(&mut self, now: DateTime<Utc>) -> bool {
        self.drain(NEGLECT_HEALTH, NEGLECT_HAPPINESS, now)
    }

    /// Lower both stats (floored at 0), recording death if health reaches 0.
    /// Returns `true` only on the transition to dead.
    pub(crate) fn drain(&mut self, health: u32, happiness: u32, now: DateTime<Utc>) -> bool {
        if self.death_at.is_some() {
            return false;
        }
        self.health = self.health.saturating_sub(health);
        self.happiness = self.happiness.saturating_sub(happiness);
        if self.health == 0 {
            self.death_at = Some(now);
            return true;
        }
        false
    }

    /// Credit `base_xp` scaled by the streak multiplier and level up as far as
    /// the experience allows.
    pub fn reward(&mut self, base_xp: u32, streak_days: u32) -> RewardOutcome {
        if self.is_max_level() || !self.is_alive() {
            return RewardOutcome::default();
        }
        let gained = (f64::from(base_xp) * xp_multiplier(streak_days)) as u32;
        self.experience += gained;
        self.happiness = (self.happiness + REWARD_HAPPINESS).min(MAX_STAT);

        let mut levels_gained = 0;
        while self.level < MAX_LEVEL && self.experience >= experience_required(self.level) {
            self.experience -= experience_required(self.level);
            self.level += 1;
            levels_gained += 1;
            self.health = (self.health + LEVEL_UP_HEALTH).min(MAX_STAT);
            self.happiness = (self.happiness + LEVEL_UP_HAPPINESS).min(MAX_STAT);
        }
        if self.is_max_level() {
            self.experience = 0;
        }

        RewardOutcome {
            experience_gained: gained,
            levels_gained,
        }
    }

    pub fn record_task(&mut self, task_id: &str) {
        self.completed_task_ids.insert(task_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn experience_required_matches_formula() {
        assert_eq!(experience_required(1), 10);
        assert_eq!(experience_required(4), 80);
        assert_eq!(experience_required(5), 111);
        assert_eq!(experience_required(6), 146);
        assert_eq!(experience_required(9), 270);
        assert_eq!(experience_required(25), 1250);
    }

    #[test]
    fn experience_required_caps_at_max_level() {
        assert_eq!(experience_required(u32::MAX), experience_required(MAX_LEVEL));
        assert_eq!(experience_required(MAX_LEVEL + 1), 1250);
    }

    #[test]
    fn reward_with_streak_multiplier_levels_several_times() {
        let mut pet = Pet::new("Mochi", PetType::Cat, now());
        pet.level = 4;
        pet.health = 50;
        pet.happiness = 40;
        let outcome = pet.reward(200, 20);
        assert_eq!(outcome.experience_gained, 400);
        // 400 - 80 - 111 - 146 = 63, and 63 < experience_required(7)
        assert_eq!(outcome.levels_gained, 3);
        assert_eq!(pet.level, 7);
        assert_eq!(pet.experience, 63);
        assert_eq!(pet.health, 65);
        assert_eq!(pet.happiness, 75);
    }

    #[test]
    fn reward_is_noop_at_max_level() {
        let mut pet = Pet::new("Mochi", PetType::Cat, now());
        pet.level = MAX_LEVEL;
        pet.happiness = 10;
        assert_eq!(pet.reward(1000, 0), RewardOutcome::default());
        assert_eq!(pet.happiness, 10);
        assert_eq!(pet.experience, 0);
    }

    #[test]
    fn reaching_max_level_clears_experience() {
        let mut pet = Pet::new("Mochi", PetType::Cat, now());
        pet.level = 24;
        pet.reward(10_000, 0);
        assert_eq!(pet.level, MAX_LEVEL);
        assert_eq!(pet.experience, 0);
    }

    #[test]
    fn neglect_kills_once() {
        let mut pet = Pet::new("Mochi", PetType::Cat, now());
        pet.health = 20;
        assert!(!pet.neglect(now()));
        assert_eq!(pet.health, 5);
        let died_at = now() + chrono::Duration::hours(1);
        assert!(pet.neglect(died_at));
        assert_eq!(pet.health, 0);
        assert!(!pet.is_alive());
        assert!(!pet.neglect(died_at + chrono::Duration::hours(1)));
        assert_eq!(pet.death_at, Some(died_at));
    }

    #[test]
    fn feeding_dead_pet_does_not_revive() {
        let mut pet = Pet::new("Mochi", PetType::Cat, now());
        pet.health = 10;
        pet.neglect(now());
        pet.feed(now());
        assert_eq!(pet.health, 0);
        assert!(!pet.is_alive());
    }

    #[test]
    fn feed_clears_deterioration_bookkeeping() {
        let mut pet = Pet::new("Mochi", PetType::Cat, now());
        pet.health = 95;
        pet.last_deterioration_at = Some(now());
        pet.feed(now());
        assert_eq!(pet.health, 100);
        assert_eq!(pet.last_fed_at, Some(now()));
        assert!(pet.last_deterioration_at.is_none());
    }

    #[test]
    fn pet_type_catalog() {
        assert!(PetType::Cat.is_free());
        assert!(!PetType::Dog.is_premium());
        assert!(PetType::Phoenix.is_premium());
        assert_eq!(PetType::Alien.formatted_price(), "$3.99");
        assert_eq!("Dragon".parse::<PetType>(), Ok(PetType::Dragon));
        assert!("hamster".parse::<PetType>().is_err());
    }

    #[test]
    fn health_status_thresholds() {
        assert_eq!(HealthStatus::from_health(80), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_health(79), HealthStatus::Okay);
        assert_eq!(HealthStatus::from_health(20), HealthStatus::Sick);
        assert_eq!(HealthStatus::from_health(19), HealthStatus::Critical);
    }

    proptest! {
        #[test]
        fn experience_required_is_non_decreasing(level in 1u32..MAX_LEVEL) {
            prop_assert!(experience_required(level) <= experience_required(level + 1));
        }

        #[test]
        fn reward_keeps_invariants(
            level in 1u32..=MAX_LEVEL,
            health in 1u32..=100,
            happiness in 0u32..=100,
            xp in 0u32..5_000,
            streak in 0u32..60,
        ) {
            let mut pet = Pet::new("p", PetType::Cat, now());
            pet.level = level;
            pet.health = health;
            pet.happiness = happiness;
            pet.reward(xp, streak);
            prop_assert!(pet.level <= MAX_LEVEL);
            prop_assert!(pet.health <= MAX_STAT);
            prop_assert!(pet.happiness <= MAX_STAT);
            if pet.level == MAX_LEVEL {
                prop_assert_eq!(pet.experience, 0);
            } else {
                prop_assert!(pet.experience < experience_required(pet.level));
            }
        }
    }
}
