//! Replay of an unobserved wall-clock gap.
//!
//! Both catch-up paths in the system go through here: check-in windows that
//! closed while nobody was watching, and whole calendar days that passed
//! while the companion was left alone. Keeping them on one primitive means
//! live timers, process resumption and daily maintenance cannot drift apart.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::schedule::CheckInWindow;

/// Calendar day of `at` in the user's offset.
pub fn local_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Whole calendar days between `from` and `to` (negative when `to` is earlier).
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>, offset: FixedOffset) -> i64 {
    (local_day(to, offset) - local_day(from, offset)).num_days()
}

/// First instant of the calendar day after `at`.
pub fn next_midnight(at: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let tomorrow = local_day(at, offset) + Duration::days(1);
    let midnight = tomorrow.and_hms_opt(0, 0, 0).unwrap_or_default();
    match midnight.and_local_timezone(offset).single() {
        Some(local) => local.with_timezone(&Utc),
        None => at + Duration::days(1),
    }
}

/// Due times of every check-in window after `anchor` that opened and closed
/// at or before `horizon`.
///
/// Windows still open at `horizon` are not reported; the walk stops there
/// because every later window closes even later.
pub fn closed_windows(
    anchor: DateTime<Utc>,
    interval: Duration,
    horizon: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let mut closed = Vec::new();
    if interval <= Duration::zero() {
        return closed;
    }
    let mut window = CheckInWindow::after(anchor, interval);
    while window.due_at <= horizon {
        if window.deadline > horizon {
            break;
        }
        closed.push(window.due_at);
        let next = CheckInWindow::after(window.due_at, interval);
        if next.due_at <= window.due_at {
            break;
        }
        window = next;
    }
    closed
}
