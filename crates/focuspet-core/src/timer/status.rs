//! Read-only view of engine state returned after each command.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pet::{HealthStatus, Pet, PetType};
use crate::rewards::{Counters, Streak};
use crate::task::{Task, TaskPhase};

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub id: String,
    pub title: String,
    pub started_at: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: f64,
    pub next_check_in: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    /// Seconds left in the open window, only while a check-in is due.
    pub window_remaining_secs: Option<i64>,
    pub completion_rate: f64,
    pub expected_check_ins: u32,
    pub verified_check_ins: usize,
    pub missed_check_ins: usize,
}

impl TaskStatus {
    pub fn of(task: &Task, now: DateTime<Utc>) -> Self {
        let window = task.next_window();
        TaskStatus {
            id: task.id.clone(),
            title: task.title.clone(),
            started_at: task.start_time,
            end_time: task.end_time,
            progress: task.progress(now),
            next_check_in: window.map(|w| w.due_at),
            deadline: window.map(|w| w.deadline),
            window_remaining_secs: window
                .and_then(|w| w.remaining(now))
                .map(|d| d.num_seconds()),
            completion_rate: task.completion_rate(),
            expected_check_ins: task.expected_check_ins(),
            verified_check_ins: task.verified_check_ins(),
            missed_check_ins: task.missed_check_ins(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PetStatus {
    pub id: String,
    pub name: String,
    pub pet_type: PetType,
    pub health: u32,
    pub happiness: u32,
    pub level: u32,
    pub experience: u32,
    pub experience_required: u32,
    pub health_status: HealthStatus,
    pub alive: bool,
}

impl From<&Pet> for PetStatus {
    fn from(pet: &Pet) -> Self {
        PetStatus {
            id: pet.id.clone(),
            name: pet.name.clone(),
            pet_type: pet.pet_type,
            health: pet.health,
            happiness: pet.happiness,
            level: pet.level,
            experience: pet.experience,
            experience_required: pet.experience_required(),
            health_status: pet.health_status(),
            alive: pet.is_alive(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub phase: TaskPhase,
    pub task: Option<TaskStatus>,
    pub pet: Option<PetStatus>,
    pub streak: Streak,
    pub coins: u64,
    pub counters: Counters,
    /// Check-ins handed to the oracle and not yet resolved.
    pub pending_check_ins: usize,
    pub next_wakeup: DateTime<Utc>,
    pub at: DateTime<Utc>,
}
