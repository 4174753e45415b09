//! Replay of check-in windows that closed while nothing was observing the clock.
//!
//! Reconciliation works from recorded state only: it starts at the last
//! recorded check-in (or the start time) and walks forward through every
//! window whose deadline has passed, appending one synthetic `missed`
//! record per window. Because each appended record becomes the new anchor,
//! running it again over the same history finds nothing left to replay.
//!
//! ```text
//!   anchor ─┬─ due₁ ─ deadline₁ ─┬─ due₂ ─ deadline₂ ─┬─ due₃ ──(open)── horizon
//!           └── missed ──────────┘└── missed ─────────┘   left for live timers
//! ```
//!
//! Penalties are not applied here; the caller applies exactly one per
//! returned entry.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{check_spans, CheckIn, Task};
use crate::catch_up::closed_windows;

/// What a replay pass found.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The schedule is internally inconsistent; the task must be closed
    /// without any further processing.
    Anomaly { reason: String },
    /// Windows were replayed (possibly none).
    Replayed {
        /// Due times of the synthetic missed entries appended, in order.
        missed: Vec<DateTime<Utc>>,
        /// The task's end time has passed; it must now be finalized.
        finished: bool,
    },
}

impl Reconciliation {
    pub fn missed_count(&self) -> usize {
        match self {
            Reconciliation::Replayed { missed, .. } => missed.len(),
            Reconciliation::Anomaly { .. } => 0,
        }
    }
}

/// Check a task's schedule for states that cannot be replayed.
pub fn detect_anomaly(task: &Task) -> Option<String> {
    let (start, end) = match (task.start_time, task.end_time) {
        (Some(start), Some(end)) => (start, end),
        _ => return Some("active task has no start or end time".to_string()),
    };
    if end < start {
        return Some(format!("end time {end} precedes start time {start}"));
    }
    if let Err(e) = check_spans(task.duration_secs, task.check_in_interval_secs) {
        return Some(format!("unsupported schedule: {e}"));
    }
    if let Some(last) = task.check_ins.last() {
        if last.timestamp < start {
            return Some(format!("check-in at {} precedes start time {start}", last.timestamp));
        }
    }
    None
}

/// Append a missed entry for every window of `task` that closed by
/// `min(now, end_time)`.
pub fn reconcile(task: &mut Task, now: DateTime<Utc>) -> Reconciliation {
    if let Some(reason) = detect_anomaly(task) {
        warn!(task_id = %task.id, %reason, "schedule anomaly found during reconciliation");
        return Reconciliation::Anomaly { reason };
    }
    let (Some(anchor), Some(end)) = (task.anchor(), task.end_time) else {
        return Reconciliation::Anomaly {
            reason: "active task has no anchor".to_string(),
        };
    };

    let horizon = now.min(end);
    let missed = closed_windows(anchor, task.check_in_interval(), horizon);
    for due_at in &missed {
        task.check_ins.push(CheckIn::missed(*due_at));
    }
    if !missed.is_empty() {
        debug!(task_id = %task.id, count = missed.len(), %horizon, "replayed missed check-ins");
    }

    Reconciliation::Replayed {
        missed,
        finished: now >= end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::VerificationResult;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn running(duration: i64, interval: i64) -> Task {
        let mut task = Task::new(
            "Read",
            Duration::seconds(duration),
            Duration::seconds(interval),
            at(0),
        )
        .unwrap();
        task.activate(at(0), None).unwrap();
        task
    }

    #[test]
    fn three_closed_windows_are_replayed() {
        // interval 600s, window 120s; windows close at 720, 1320, 1920
        let mut task = running(7200, 600);
        let result = reconcile(&mut task, at(2000));
        assert_eq!(
            result,
            Reconciliation::Replayed {
                missed: vec![at(600), at(1200), at(1800)],
                finished: false,
            }
        );
        assert_eq!(task.missed_check_ins(), 3);
        assert!(task
            .check_ins
            .iter()
            .all(|c| c.result == VerificationResult::Missed && !c.verified));
        assert_eq!(task.next_check_in_time(), Some(at(2400)));
    }

    #[test]
    fn open_window_is_left_alone() {
        let mut task = running(7200, 600);
        let result = reconcile(&mut task, at(650));
        assert_eq!(result.missed_count(), 0);
        assert!(task.check_ins.is_empty());
    }

    #[test]
    fn replay_is_idempotent() {
        let mut task = running(7200, 600);
        reconcile(&mut task, at(2000));
        let first = task.check_ins.len();
        let again = reconcile(&mut task, at(2000));
        assert_eq!(again.missed_count(), 0);
        assert_eq!(task.check_ins.len(), first);
    }

    #[test]
    fn replay_stops_at_end_time() {
        // 1800s task, interval 600s: windows close at 720, 1320; 1800+120 is past the end
        let mut task = running(1800, 600);
        let result = reconcile(&mut task, at(100_000));
        assert_eq!(
            result,
            Reconciliation::Replayed {
                missed: vec![at(600), at(1200)],
                finished: true,
            }
        );
    }

    #[test]
    fn replay_starts_after_last_recorded_check_in() {
        let mut task = running(7200, 600);
        task.check_ins.push(CheckIn::resolved(at(650), None, true));
        let result = reconcile(&mut task, at(1400));
        // next due 1250, deadline 1370
        assert_eq!(result.missed_count(), 1);
        assert_eq!(task.check_ins.last().unwrap().timestamp, at(1250));
    }

    #[test]
    fn end_before_start_is_an_anomaly() {
        let mut task = running(600, 60);
        task.end_time = Some(at(-10));
        assert!(matches!(reconcile(&mut task, at(100)), Reconciliation::Anomaly { .. }));
        assert!(task.check_ins.is_empty());
    }

    #[test]
    fn missing_start_is_an_anomaly() {
        let mut task = running(600, 60);
        task.start_time = None;
        assert!(detect_anomaly(&task).is_some());
    }

    #[test]
    fn out_of_range_spans_are_anomalies() {
        let mut task = running(600, 60);
        task.check_in_interval_secs = i64::MAX;
        assert!(matches!(reconcile(&mut task, at(100)), Reconciliation::Anomaly { .. }));

        let mut task = running(600, 60);
        task.duration_secs = i64::MIN;
        assert!(detect_anomaly(&task).is_some());

        let mut task = running(600, 60);
        task.check_in_interval_secs = 0;
        assert!(detect_anomaly(&task).is_some());
    }
}
