//! Best-effort local alerts mirroring a task's schedule.
//!
//! Alerts are advisory. The engine never reads them back; reconciliation is
//! what decides which check-ins were missed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schedule::CheckInWindow;
use crate::storage::Settings;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A check-in becomes due.
    Due,
    /// A check-in window closes.
    Deadline,
    /// The task ends.
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub task_id: String,
    pub kind: AlertKind,
    pub at: DateTime<Utc>,
    /// 1-based check-in number, 0 for the completion alert.
    pub number: u32,
}

/// Receives alert plans from the engine.
pub trait NotificationScheduler {
    /// Replace all alerts for `task_id` with `alerts`.
    fn schedule(&self, task_id: &str, alerts: &[Alert]) -> Result<()>;

    /// Drop every alert tagged with `task_id`.
    fn cancel(&self, task_id: &str) -> Result<()>;
}

/// Scheduler that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl NotificationScheduler for NoopScheduler {
    fn schedule(&self, _task_id: &str, _alerts: &[Alert]) -> Result<()> {
        Ok(())
    }

    fn cancel(&self, _task_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Alerts for every check-in of `task` still ahead of `now`, plus the
/// completion alert, filtered by the user's notification settings.
///
/// Windows are walked from the task's anchor, so a plan made after a
/// check-in follows the schedule that check-in produced.
pub fn plan_alerts(task: &Task, now: DateTime<Utc>, settings: &Settings) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if !settings.notifications_enabled {
        return alerts;
    }
    let (Some(anchor), Some(end)) = (task.anchor(), task.end_time) else {
        return alerts;
    };

    let interval = task.check_in_interval();
    let mut window = CheckInWindow::after(anchor, interval);
    let mut number = u32::try_from(task.check_ins.len()).unwrap_or(u32::MAX).saturating_add(1);
    while window.due_at <= end && interval > chrono::Duration::zero() {
        if settings.check_in_reminders && window.due_at > now {
            alerts.push(Alert {
                task_id: task.id.clone(),
                kind: AlertKind::Due,
                at: window.due_at,
                number,
            });
        }
        if window.deadline <= end && window.deadline > now {
            alerts.push(Alert {
                task_id: task.id.clone(),
                kind: AlertKind::Deadline,
                at: window.deadline,
                number,
            });
        }
        let next = CheckInWindow::after(window.due_at, interval);
        if next.due_at <= window.due_at {
            break;
        }
        window = next;
        number = number.saturating_add(1);
    }
    if end > now {
        alerts.push(Alert {
            task_id: task.id.clone(),
            kind: AlertKind::Completion,
            at: end,
            number: 0,
        });
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn started() -> Task {
        let mut task =
            Task::new("Write", Duration::seconds(3600), Duration::seconds(720), at(0)).unwrap();
        task.activate(at(0), None).unwrap();
        task
    }

    #[test]
    fn plans_due_deadline_and_completion() {
        let alerts = plan_alerts(&started(), at(0), &Settings::default());
        let due = alerts.iter().filter(|a| a.kind == AlertKind::Due).count();
        let deadline = alerts.iter().filter(|a| a.kind == AlertKind::Deadline).count();
        // dues at 720..3600; the fifth deadline (3744) falls after the end
        assert_eq!(due, 5);
        assert_eq!(deadline, 4);
        assert_eq!(alerts.last().unwrap().kind, AlertKind::Completion);
        assert_eq!(alerts.last().unwrap().at, at(3600));
    }

    #[test]
    fn past_alerts_are_skipped() {
        let alerts = plan_alerts(&started(), at(1500), &Settings::default());
        assert!(alerts.iter().all(|a| a.at > at(1500)));
        assert_eq!(alerts.iter().find(|a| a.kind == AlertKind::Due).unwrap().number, 3);
    }

    #[test]
    fn plan_follows_last_check_in() {
        let mut task = started();
        task.check_ins.push(crate::task::CheckIn::resolved(at(800), None, true));
        let alerts = plan_alerts(&task, at(800), &Settings::default());
        let first_due = alerts.iter().find(|a| a.kind == AlertKind::Due).unwrap();
        assert_eq!(first_due.at, at(1520));
        assert_eq!(first_due.number, 2);
        let first_deadline = alerts.iter().find(|a| a.kind == AlertKind::Deadline).unwrap();
        assert_eq!(first_deadline.at, at(1664));
        // dues at 1520, 2240, 2960; 3680 is past the end
        assert_eq!(alerts.iter().filter(|a| a.kind == AlertKind::Due).count(), 3);
    }

    #[test]
    fn settings_filter_alerts() {
        let mut settings = Settings::default();
        settings.check_in_reminders = false;
        let alerts = plan_alerts(&started(), at(0), &settings);
        assert!(alerts.iter().all(|a| a.kind != AlertKind::Due));

        settings.notifications_enabled = false;
        assert!(plan_alerts(&started(), at(0), &settings).is_empty());
    }
}
