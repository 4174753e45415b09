use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pet::PetType;
use crate::rewards::BadgeId;

/// Every state change in the engine produces an Event.
/// Events are queued by the engine and drained by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TaskStarted {
        task_id: String,
        pet_id: Option<String>,
        end_time: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A check-in window opened.
    CheckInDue {
        task_id: String,
        due_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    },
    /// Evidence handed to the oracle; the verdict arrives later.
    CheckInSubmitted {
        task_id: String,
        ticket: u64,
        at: DateTime<Utc>,
    },
    CheckInVerified {
        task_id: String,
        check_in_id: String,
        at: DateTime<Utc>,
    },
    CheckInFailed {
        task_id: String,
        check_in_id: String,
        at: DateTime<Utc>,
    },
    /// A window closed without a check-in.
    CheckInMissed {
        task_id: String,
        due_at: DateTime<Utc>,
        /// Found by reconciliation after a gap rather than by a live timer.
        replayed: bool,
    },
    TaskCompleted {
        task_id: String,
        successful: bool,
        completion_rate: f64,
        at: DateTime<Utc>,
    },
    TaskCancelled {
        task_id: String,
        at: DateTime<Utc>,
    },
    /// Closed without processing because its schedule was inconsistent.
    TaskDiscarded {
        task_id: String,
        reason: String,
        at: DateTime<Utc>,
    },
    PetAdopted {
        pet_id: String,
        pet_type: PetType,
        at: DateTime<Utc>,
    },
    PetLevelUp {
        pet_id: String,
        level: u32,
    },
    PetDeteriorated {
        pet_id: String,
        days: u32,
        health: u32,
        happiness: u32,
    },
    PetDied {
        pet_id: String,
        at: DateTime<Utc>,
    },
    StreakAdvanced {
        current: u32,
        longest: u32,
    },
    BadgeUnlocked {
        badge_id: BadgeId,
        points: u32,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Task the event belongs to, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Event::TaskStarted { task_id, .. }
            | Event::CheckInDue { task_id, .. }
            | Event::CheckInSubmitted { task_id, .. }
            | Event::CheckInVerified { task_id, .. }
            | Event::CheckInFailed { task_id, .. }
            | Event::CheckInMissed { task_id, .. }
            | Event::TaskCompleted { task_id, .. }
            | Event::TaskCancelled { task_id, .. }
            | Event::TaskDiscarded { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// Whether the event ends the task it belongs to.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::TaskCompleted { .. } | Event::TaskCancelled { .. } | Event::TaskDiscarded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::StreakAdvanced {
            current: 3,
            longest: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StreakAdvanced");
        assert_eq!(json["current"], 3);
    }

    #[test]
    fn terminal_events_carry_task_id() {
        let event = Event::TaskCancelled {
            task_id: "task-1".into(),
            at: Utc::now(),
        };
        assert!(event.is_terminal());
        assert_eq!(event.task_id(), Some("task-1"));
    }
}
