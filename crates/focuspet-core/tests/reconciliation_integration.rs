//! Property tests for gap replay.

use chrono::{DateTime, Duration, TimeZone, Utc};
use focuspet_core::catch_up::closed_windows;
use focuspet_core::task::reconciliation::{reconcile, Reconciliation};
use focuspet_core::task::{CheckIn, Task};
use proptest::prelude::*;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn running(duration: i64, interval: i64) -> Task {
    let mut task = Task::new(
        "Focus",
        Duration::seconds(duration),
        Duration::seconds(interval),
        at(0),
    )
    .unwrap();
    task.activate(at(0), None).unwrap();
    task
}

proptest! {
    #[test]
    fn replay_is_idempotent(
        duration in 600i64..14_400,
        interval in 120i64..3_600,
        gap in 0i64..20_000,
    ) {
        let mut task = running(duration, interval);
        let first = reconcile(&mut task, at(gap));
        let after_first = task.check_ins.len();
        let second = reconcile(&mut task, at(gap));

        prop_assert!(matches!(first, Reconciliation::Replayed { .. }), "expected Replayed, got {:?}", first);
        prop_assert_eq!(second.missed_count(), 0);
        prop_assert_eq!(task.check_ins.len(), after_first);
    }

    #[test]
    fn replay_never_exceeds_expected(
        duration in 600i64..14_400,
        interval in 120i64..3_600,
        gap in 0i64..40_000,
    ) {
        let mut task = running(duration, interval);
        reconcile(&mut task, at(gap));
        prop_assert!(task.missed_check_ins() as u32 <= task.expected_check_ins());
    }

    #[test]
    fn next_window_is_still_open_after_replay(
        duration in 600i64..14_400,
        interval in 120i64..3_600,
        gap in 0i64..14_400,
    ) {
        let mut task = running(duration, interval);
        let horizon = at(gap).min(task.end_time.unwrap());
        reconcile(&mut task, at(gap));
        let window = task.next_window().unwrap();
        prop_assert!(window.deadline > horizon);
    }

    #[test]
    fn split_gap_matches_single_gap(
        interval in 120i64..3_600,
        split in 0i64..10_000,
        rest in 0i64..10_000,
    ) {
        let mut once = running(36_000, interval);
        let mut twice = running(36_000, interval);
        reconcile(&mut once, at(split + rest));
        reconcile(&mut twice, at(split));
        reconcile(&mut twice, at(split + rest));
        prop_assert_eq!(once.missed_check_ins(), twice.missed_check_ins());
    }
}

#[test]
fn test_replay_resumes_from_last_check_in() {
    let mut task = running(7200, 600);
    task.check_ins.push(CheckIn::resolved(at(500), None, true));
    // windows now due 1100/1700/2300, closing 120s later
    let result = reconcile(&mut task, at(2000));
    assert_eq!(result.missed_count(), 2);
    assert_eq!(task.next_check_in_time(), Some(at(2300)));
}

#[test]
fn test_closed_windows_matches_reconcile() {
    let mut task = running(3600, 600);
    let expected = closed_windows(at(0), Duration::seconds(600), at(2500));
    match reconcile(&mut task, at(2500)) {
        Reconciliation::Replayed { missed, finished } => {
            assert_eq!(missed, expected);
            assert!(!finished);
        }
        Reconciliation::Anomaly { reason } => panic!("unexpected anomaly: {reason}"),
    }
}

#[test]
fn test_end_before_start_is_anomaly() {
    let mut task = running(3600, 600);
    task.end_time = Some(at(-10));
    assert!(matches!(
        reconcile(&mut task, at(100)),
        Reconciliation::Anomaly { .. }
    ));
    assert!(task.check_ins.is_empty());
}
