//! Idle deterioration of an unattended pet.
//!
//! Runs once per calendar day boundary, and on resume catches up however
//! many whole days passed. The first two days after a feed are free; each
//! later day costs 3 health and 2 happiness. `last_deterioration_at` marks
//! the day already charged so the same day is never charged twice.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;

use super::Pet;
use crate::catch_up::elapsed_days;

/// Days after a feed during which no deterioration applies.
pub const GRACE_DAYS: i64 = 2;
pub const HEALTH_PER_DAY: u32 = 3;
pub const HAPPINESS_PER_DAY: u32 = 2;

/// Deterioration applied by one catch-up pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deterioration {
    pub days: u32,
    /// The pet died during this pass.
    pub died: bool,
}

/// Number of days still to charge at `now`.
pub fn pending_days(pet: &Pet, now: DateTime<Utc>, offset: FixedOffset) -> i64 {
    let Some(last_fed) = pet.last_fed_at else {
        return 0;
    };
    let past_grace = elapsed_days(last_fed, now, offset) - GRACE_DAYS;
    if past_grace <= 0 {
        return 0;
    }
    match pet.last_deterioration_at {
        Some(last) => elapsed_days(last, now, offset).max(0),
        None => past_grace,
    }
}

/// Charge every pending day at once. Returns `None` when nothing applied.
pub fn apply(pet: &mut Pet, now: DateTime<Utc>, offset: FixedOffset) -> Option<Deterioration> {
    if !pet.is_alive() {
        return None;
    }
    let days = pending_days(pet, now, offset);
    if days <= 0 {
        return None;
    }
    let days = u32::try_from(days).unwrap_or(u32::MAX);
    let died = pet.drain(
        HEALTH_PER_DAY.saturating_mul(days),
        HAPPINESS_PER_DAY.saturating_mul(days),
        now,
    );
    pet.last_deterioration_at = Some(now);
    debug!(pet_id = %pet.id, days, health = pet.health, "applied idle deterioration");
    Some(Deterioration { days, died })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::PetType;
    use chrono::{Duration, TimeZone};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap() + Duration::days(n)
    }

    fn fed_pet() -> Pet {
        let mut pet = Pet::new("Mochi", PetType::Cat, day(0));
        pet.feed(day(0));
        pet
    }

    #[test]
    fn five_unfed_days_charge_three() {
        let mut pet = fed_pet();
        let result = apply(&mut pet, day(5), utc()).unwrap();
        assert_eq!(result, Deterioration { days: 3, died: false });
        assert_eq!(pet.health, 91);
        assert_eq!(pet.happiness, 94);
    }

    #[test]
    fn grace_period_charges_nothing() {
        let mut pet = fed_pet();
        assert!(apply(&mut pet, day(2), utc()).is_none());
        assert_eq!(pet.health, 100);
    }

    #[test]
    fn same_day_is_not_charged_twice() {
        let mut pet = fed_pet();
        apply(&mut pet, day(5), utc());
        assert!(apply(&mut pet, day(5) + Duration::hours(3), utc()).is_none());
        let next = apply(&mut pet, day(6), utc()).unwrap();
        assert_eq!(next.days, 1);
        assert_eq!(pet.health, 88);
    }

    #[test]
    fn never_fed_pet_is_left_alone() {
        let mut pet = Pet::new("Mochi", PetType::Cat, day(0));
        assert!(apply(&mut pet, day(30), utc()).is_none());
    }

    #[test]
    fn long_absence_kills() {
        let mut pet = fed_pet();
        let result = apply(&mut pet, day(60), utc()).unwrap();
        assert!(result.died);
        assert_eq!(pet.health, 0);
        assert_eq!(pet.death_at, Some(day(60)));
        assert!(apply(&mut pet, day(61), utc()).is_none());
    }
}
