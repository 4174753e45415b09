//! Check-in schedule arithmetic.
//!
//! Pure functions shared by live timer arming and by gap reconciliation, so
//! that both paths always agree on when a window opens and closes.
//!
//! ```text
//!   anchor ───── interval ─────> due_at ── window ──> deadline
//!   (last check-in or start)      (is_due)            (is_overdue)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Share of the check-in interval granted as tolerance after a check-in is due.
pub const WINDOW_FRACTION_DIVISOR: i64 = 5;

/// Lower bound of the tolerance window.
pub const MIN_WINDOW_SECS: i64 = 2 * 60;

/// Upper bound of the tolerance window.
pub const MAX_WINDOW_SECS: i64 = 10 * 60;

/// Completion rate at or above which a task counts as successful.
pub const SUCCESS_THRESHOLD: f64 = 0.70;

/// Tolerance after a check-in becomes due: 20% of the interval,
/// clamped to `[2 min, 10 min]`.
pub fn window_size(interval: Duration) -> Duration {
    let fraction_ms = interval.num_milliseconds() / WINDOW_FRACTION_DIVISOR;
    Duration::milliseconds(fraction_ms.clamp(MIN_WINDOW_SECS * 1000, MAX_WINDOW_SECS * 1000))
}

/// Number of check-ins a task of `duration` is expected to produce.
pub fn expected_check_ins(duration: Duration, interval: Duration) -> u32 {
    let interval_ms = interval.num_milliseconds();
    if interval_ms <= 0 {
        return 0;
    }
    (duration.num_milliseconds().max(0) / interval_ms) as u32
}

/// `verified / floor(duration / interval)`, or 0 when no check-ins are expected.
pub fn completion_rate(verified: usize, duration: Duration, interval: Duration) -> f64 {
    let expected = expected_check_ins(duration, interval);
    if expected == 0 {
        return 0.0;
    }
    verified as f64 / expected as f64
}

pub fn is_successful(completion_rate: f64) -> bool {
    completion_rate >= SUCCESS_THRESHOLD
}

/// 0.0 ..= 1.0 progress through the task's span.
pub fn progress(start: DateTime<Utc>, duration: Duration, now: DateTime<Utc>) -> f64 {
    let total = duration.num_milliseconds();
    if total <= 0 {
        return 1.0;
    }
    let elapsed = (now - start).num_milliseconds().max(0);
    (elapsed as f64 / total as f64).min(1.0)
}

/// One check-in window: when it opens and when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInWindow {
    pub due_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl CheckInWindow {
    /// The window that follows `anchor` (the last recorded check-in, or the start).
    /// Instants past the representable range saturate at its upper end.
    pub fn after(anchor: DateTime<Utc>, interval: Duration) -> Self {
        let due_at = anchor
            .checked_add_signed(interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            due_at,
            deadline: due_at
                .checked_add_signed(window_size(interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_at
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Time left to check in, only while the window is open.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_due(now) {
            return None;
        }
        Some((self.deadline - now).max(Duration::zero()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn window_hits_two_minute_floor() {
        assert_eq!(window_size(Duration::seconds(600)), Duration::seconds(120));
        assert_eq!(window_size(Duration::seconds(60)), Duration::seconds(120));
    }

    #[test]
    fn window_hits_ten_minute_ceiling() {
        assert_eq!(window_size(Duration::seconds(3600)), Duration::seconds(600));
    }

    #[test]
    fn window_is_twenty_percent_in_between() {
        assert_eq!(window_size(Duration::seconds(1800)), Duration::seconds(360));
    }

    #[test]
    fn expected_check_ins_floors() {
        assert_eq!(expected_check_ins(Duration::seconds(3600), Duration::seconds(720)), 5);
        assert_eq!(expected_check_ins(Duration::seconds(3600), Duration::seconds(700)), 5);
        assert_eq!(expected_check_ins(Duration::seconds(600), Duration::seconds(900)), 0);
        assert_eq!(expected_check_ins(Duration::seconds(600), Duration::zero()), 0);
    }

    #[test]
    fn four_of_five_is_successful() {
        let rate = completion_rate(4, Duration::seconds(3600), Duration::seconds(720));
        assert!((rate - 0.8).abs() < f64::EPSILON);
        assert!(is_successful(rate));
        let rate = completion_rate(3, Duration::seconds(3600), Duration::seconds(720));
        assert!(!is_successful(rate));
    }

    #[test]
    fn completion_rate_is_zero_without_expected_check_ins() {
        assert_eq!(completion_rate(3, Duration::seconds(60), Duration::seconds(600)), 0.0);
    }

    #[test]
    fn progress_is_capped() {
        let d = Duration::seconds(100);
        assert_eq!(progress(at(0), d, at(50)), 0.5);
        assert_eq!(progress(at(0), d, at(500)), 1.0);
        assert_eq!(progress(at(0), d, at(-10)), 0.0);
    }

    #[test]
    fn window_flags_follow_now() {
        let w = CheckInWindow::after(at(0), Duration::seconds(600));
        assert_eq!(w.due_at, at(600));
        assert_eq!(w.deadline, at(720));
        assert!(!w.is_due(at(599)));
        assert!(w.is_due(at(600)));
        assert!(!w.is_overdue(at(719)));
        assert!(w.is_overdue(at(720)));
        assert_eq!(w.remaining(at(100)), None);
        assert_eq!(w.remaining(at(700)), Some(Duration::seconds(20)));
        assert_eq!(w.remaining(at(800)), Some(Duration::zero()));
    }

    #[test]
    fn window_saturates_at_end_of_time() {
        let w = CheckInWindow::after(DateTime::<Utc>::MAX_UTC, Duration::seconds(600));
        assert_eq!(w.due_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(w.deadline, DateTime::<Utc>::MAX_UTC);
    }
}
