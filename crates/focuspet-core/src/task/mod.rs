//! Task and check-in records.
//!
//! A task is a timed activity that requires a check-in once per interval.
//! Its lifecycle is one-way:
//!
//! ```text
//!   created (inert) ──start──> active ──┬── completion ──> Completed
//!                                       └── cancel ──────> Cancelled
//! ```
//!
//! A terminated task is never reactivated; running again means creating a
//! new task. Check-ins are append-only and kept in chronological order.

pub mod evidence;
pub mod reconciliation;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::schedule::{self, CheckInWindow};

pub use evidence::Evidence;

/// Longest span a task may run for, in seconds.
pub const MAX_DURATION_SECS: i64 = 24 * 60 * 60;

/// Longest spacing between check-ins, in seconds.
pub const MAX_CHECK_IN_INTERVAL_SECS: i64 = MAX_DURATION_SECS;

/// Check that both spans are positive and within the supported range.
pub fn check_spans(duration_secs: i64, check_in_interval_secs: i64) -> Result<(), ValidationError> {
    if duration_secs <= 0 {
        return Err(ValidationError::invalid("duration", "must be positive"));
    }
    if duration_secs > MAX_DURATION_SECS {
        return Err(ValidationError::invalid(
            "duration",
            format!("must be at most {} hours", MAX_DURATION_SECS / 3600),
        ));
    }
    if check_in_interval_secs <= 0 {
        return Err(ValidationError::invalid("check_in_interval", "must be positive"));
    }
    if check_in_interval_secs > MAX_CHECK_IN_INTERVAL_SECS {
        return Err(ValidationError::invalid(
            "check_in_interval",
            format!("must be at most {} hours", MAX_CHECK_IN_INTERVAL_SECS / 3600),
        ));
    }
    Ok(())
}

/// Outcome tag of a single check-in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationResult {
    Verified,
    Failed,
    #[default]
    Pending,
    Missed,
}

/// A single proof-of-engagement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: String,
    /// When the check-in was submitted, or when it fell due for missed ones.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub evidence: Option<Evidence>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub result: VerificationResult,
}

impl CheckIn {
    /// A check-in resolved by the verification oracle.
    pub fn resolved(timestamp: DateTime<Utc>, evidence: Option<Evidence>, verified: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            evidence,
            verified,
            result: if verified {
                VerificationResult::Verified
            } else {
                VerificationResult::Failed
            },
        }
    }

    /// Synthetic record for a window that closed without a check-in.
    pub fn missed(due_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: due_at,
            evidence: None,
            verified: false,
            result: VerificationResult::Missed,
        }
    }

    pub fn is_missed(&self) -> bool {
        self.result == VerificationResult::Missed
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Ran to its end time.
    Completed { successful: bool },
    /// Abandoned by the user.
    Cancelled,
    /// Found with an inconsistent schedule and closed without processing.
    Discarded,
}

/// Where a task currently stands in the check-in cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Not running (never started).
    Idle,
    /// Active, next check-in not yet due.
    Running,
    /// Active, check-in due and its window still open.
    CheckInDue,
    /// Active, window closed without a resolution yet.
    CheckInOverdue,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPhase::Idle => "idle",
            TaskPhase::Running => "running",
            TaskPhase::CheckInDue => "check_in_due",
            TaskPhase::CheckInOverdue => "check_in_overdue",
            TaskPhase::Completed => "completed",
            TaskPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// Total span in seconds.
    pub duration_secs: i64,
    /// Spacing between required check-ins in seconds.
    pub check_in_interval_secs: i64,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub check_ins: Vec<CheckIn>,
    /// Companion running this task.
    #[serde(default)]
    pub pet_id: Option<String>,
    #[serde(default)]
    pub outcome: Option<TaskOutcome>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create an inert task.
    ///
    /// # Errors
    /// Returns an error if the title is blank or either span is not positive
    /// or exceeds its maximum.
    pub fn new(
        title: impl Into<String>,
        duration: Duration,
        check_in_interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::invalid("title", "must not be empty"));
        }
        check_spans(duration.num_seconds(), check_in_interval.num_seconds())?;
        Ok(Task {
            id: format!("task-{}", uuid::Uuid::new_v4()),
            title,
            duration_secs: duration.num_seconds(),
            check_in_interval_secs: check_in_interval.num_seconds(),
            start_time: None,
            end_time: None,
            active: false,
            check_ins: Vec::new(),
            pet_id: None,
            outcome: None,
            created_at: Some(now),
        })
    }

    /// Total span, clamped to the supported range.
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs.clamp(0, MAX_DURATION_SECS))
    }

    /// Check-in spacing, clamped to the supported range.
    pub fn check_in_interval(&self) -> Duration {
        Duration::seconds(self.check_in_interval_secs.clamp(0, MAX_CHECK_IN_INTERVAL_SECS))
    }

    pub fn window_size(&self) -> Duration {
        schedule::window_size(self.check_in_interval())
    }

    /// Whether the task has ever been started.
    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_terminated(&self) -> bool {
        self.outcome.is_some()
    }

    /// Stamp start/end and mark the task active.
    ///
    /// # Errors
    /// Returns an error if the stored spans are out of range or the end
    /// time cannot be represented.
    pub fn activate(
        &mut self,
        now: DateTime<Utc>,
        pet_id: Option<String>,
    ) -> Result<(), ValidationError> {
        check_spans(self.duration_secs, self.check_in_interval_secs)?;
        let end = now
            .checked_add_signed(self.duration())
            .ok_or_else(|| ValidationError::invalid("duration", "end time out of range"))?;
        self.start_time = Some(now);
        self.end_time = Some(end);
        self.active = true;
        self.pet_id = pet_id;
        Ok(())
    }

    pub fn terminate(&mut self, outcome: TaskOutcome) {
        self.active = false;
        self.outcome = Some(outcome);
    }

    /// Last recorded check-in time, or the start time if none.
    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        let start = self.start_time?;
        Some(self.check_ins.last().map(|c| c.timestamp).unwrap_or(start))
    }

    /// The window following the last recorded check-in.
    pub fn next_window(&self) -> Option<CheckInWindow> {
        self.anchor()
            .map(|anchor| CheckInWindow::after(anchor, self.check_in_interval()))
    }

    pub fn next_check_in_time(&self) -> Option<DateTime<Utc>> {
        self.next_window().map(|w| w.due_at)
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.next_window().map(|w| w.deadline)
    }

    pub fn is_check_in_due(&self, now: DateTime<Utc>) -> bool {
        self.next_window().is_some_and(|w| w.is_due(now))
    }

    pub fn is_check_in_overdue(&self, now: DateTime<Utc>) -> bool {
        self.next_window().is_some_and(|w| w.is_overdue(now))
    }

    /// Whether a check-in submitted at `now` lands inside the open window.
    pub fn accepts_check_in(&self, now: DateTime<Utc>) -> bool {
        self.active && self.is_check_in_due(now) && !self.is_check_in_overdue(now)
    }

    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        match self.start_time {
            Some(start) => schedule::progress(start, self.duration(), now),
            None => 0.0,
        }
    }

    pub fn expected_check_ins(&self) -> u32 {
        schedule::expected_check_ins(self.duration(), self.check_in_interval())
    }

    pub fn verified_check_ins(&self) -> usize {
        self.check_ins.iter().filter(|c| c.verified).count()
    }

    pub fn missed_check_ins(&self) -> usize {
        self.check_ins.iter().filter(|c| c.is_missed()).count()
    }

    pub fn completion_rate(&self) -> f64 {
        schedule::completion_rate(
            self.verified_check_ins(),
            self.duration(),
            self.check_in_interval(),
        )
    }

    pub fn is_successful(&self) -> bool {
        schedule::is_successful(self.completion_rate())
    }

    /// Completed successfully (cancelled and discarded tasks never count).
    pub fn counts_as_success(&self) -> bool {
        matches!(self.outcome, Some(TaskOutcome::Completed { successful: true }))
    }

    pub fn phase(&self, now: DateTime<Utc>) -> TaskPhase {
        match self.outcome {
            Some(TaskOutcome::Cancelled) => return TaskPhase::Cancelled,
            Some(_) => return TaskPhase::Completed,
            None => {}
        }
        if !self.active {
            return TaskPhase::Idle;
        }
        match self.next_window() {
            Some(w) if w.is_overdue(now) => TaskPhase::CheckInOverdue,
            Some(w) if w.is_due(now) => TaskPhase::CheckInDue,
            Some(_) => TaskPhase::Running,
            None => TaskPhase::Idle,
        }
    }
}
