//! Logical timer queue.
//!
//! Timers are plain data: a purpose, the task they belong to and the instant
//! they fall due. Nothing fires on its own; the caller pops due timers with
//! an explicit `now`, which is what makes suspend/resume testable.
//!
//! At most one timer per [`TimerKind`] is armed at a time. Arming a kind
//! replaces whatever was armed for it before (cancel-and-replace).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Purpose of an armed timer. Declaration order is the firing order for
/// timers due at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    NextCheckIn,
    Deadline,
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmedTimer {
    pub kind: TimerKind,
    pub task_id: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct TimerQueue {
    armed: Vec<ArmedTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind`, replacing any timer already armed for it.
    pub fn arm(&mut self, kind: TimerKind, task_id: &str, due_at: DateTime<Utc>) {
        self.disarm(kind);
        debug!(?kind, task_id, %due_at, "timer armed");
        self.armed.push(ArmedTimer {
            kind,
            task_id: task_id.to_string(),
            due_at,
        });
    }

    pub fn disarm(&mut self, kind: TimerKind) -> Option<ArmedTimer> {
        let pos = self.armed.iter().position(|t| t.kind == kind)?;
        Some(self.armed.swap_remove(pos))
    }

    pub fn disarm_all(&mut self) {
        self.armed.clear();
    }

    pub fn get(&self, kind: TimerKind) -> Option<&ArmedTimer> {
        self.armed.iter().find(|t| t.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    pub fn armed(&self) -> impl Iterator<Item = &ArmedTimer> {
        self.armed.iter()
    }

    /// Earliest instant any timer falls due.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.armed.iter().map(|t| t.due_at).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ArmedTimer> {
        let pos = self
            .armed
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_at <= now)
            .min_by_key(|(_, t)| (t.due_at, t.kind))
            .map(|(i, _)| i)?;
        Some(self.armed.swap_remove(pos))
    }
}
