use focuspet_core::BadgeView;
use serde::Serialize;

use super::{print_json, CliResult, Session};

#[derive(Serialize)]
struct StreakReport<'a> {
    #[serde(flatten)]
    streak: &'a focuspet_core::Streak,
    multiplier: f64,
    coins: u64,
    total_points: u64,
}

pub fn streak() -> CliResult {
    let session = Session::open()?;
    let snapshot = session.engine.snapshot();
    print_json(&StreakReport {
        streak: &snapshot.streak,
        multiplier: snapshot.streak.multiplier(),
        coins: snapshot.currency.coins,
        total_points: snapshot.counters.total_points,
    })
}

pub fn badges(unlocked_only: bool) -> CliResult {
    let session = Session::open()?;
    let badges: Vec<BadgeView> = session
        .engine
        .snapshot()
        .badges
        .iter()
        .filter(|b| !unlocked_only || b.unlocked)
        .map(|b| b.view())
        .collect();
    print_json(&badges)
}

pub fn alerts() -> CliResult {
    let session = Session::open()?;
    print_json(&session.db.alerts()?)
}

pub fn premium() -> CliResult {
    let mut session = Session::open()?;
    session.engine.upgrade_to_premium();
    print_json(&session.engine.snapshot().settings)
}
