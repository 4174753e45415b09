//! Task state machine.
//!
//! The engine is a wall-clock-based state machine. It does not use internal
//! threads or read the system clock: every command takes `now`, and the
//! caller is responsible for calling `tick()` when [`Engine::next_wakeup`]
//! comes around.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> CheckInDue -> CheckInOverdue -> Running ... -> Completed
//!            \______________________ cancel() _________________/-> Cancelled
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = Engine::open(store, scheduler, EngineOptions::default(), now);
//! let task = engine.create_task("Study", hours(1), minutes(12), now)?;
//! engine.start(&task.id, now)?;
//! // Later:
//! engine.tick(now);
//! for event in engine.drain_events() { /* ... */ }
//! ```

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::queue::{ArmedTimer, TimerKind, TimerQueue};
use super::status::{PetStatus, Status, TaskStatus};
use crate::catch_up::{local_day, next_midnight};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::Event;
use crate::notify::{plan_alerts, NotificationScheduler};
use crate::pet::{deterioration, Pet, PetType};
use crate::rewards::badges::{self, BadgeStats};
use crate::rewards::{
    StreakUpdate, BADGE_COINS, CHECK_IN_COINS, CHECK_IN_XP, TASK_COINS, TASK_XP,
};
use crate::schedule;
use crate::storage::snapshot::PREMIUM_MAX_PETS;
use crate::storage::{AppSnapshot, Config, SnapshotStore};
use crate::task::reconciliation::{reconcile, Reconciliation};
use crate::task::{CheckIn, Evidence, Task, TaskOutcome, TaskPhase};

/// Name of the companion created on first launch.
pub const INITIAL_PET_NAME: &str = "Buddy";

pub type SharedStore = Arc<dyn SnapshotStore + Send + Sync>;
pub type SharedScheduler = Arc<dyn NotificationScheduler + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Offset that defines calendar days.
    pub utc_offset: FixedOffset,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            utc_offset: config.utc_offset(),
        }
    }
}

/// Handle for a check-in waiting on the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckInTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum CheckInResolution {
    Applied { check_in_id: String, verified: bool },
    /// The window was already resolved (or the task ended) before the verdict arrived.
    Stale,
}

#[derive(Debug, Clone)]
struct PendingCheckIn {
    task_id: String,
    /// Number of recorded check-ins at submission; identifies the window.
    window: usize,
    evidence: Evidence,
    submitted_at: DateTime<Utc>,
}

/// Sole owner and writer of tasks, pets, streak and badges.
pub struct Engine {
    state: AppSnapshot,
    timers: TimerQueue,
    store: SharedStore,
    scheduler: SharedScheduler,
    options: EngineOptions,
    events: Vec<Event>,
    pending: HashMap<u64, PendingCheckIn>,
    next_ticket: u64,
    last_maintenance_day: Option<NaiveDate>,
}

impl Engine {
    pub fn new(
        state: AppSnapshot,
        store: SharedStore,
        scheduler: SharedScheduler,
        options: EngineOptions,
    ) -> Self {
        Self {
            state: state.normalize(),
            timers: TimerQueue::new(),
            store,
            scheduler,
            options,
            events: Vec::new(),
            pending: HashMap::new(),
            next_ticket: 1,
            last_maintenance_day: None,
        }
    }

    /// Load the persisted snapshot. A missing or unreadable snapshot yields
    /// fresh defaults.
    pub fn load(store: SharedStore, scheduler: SharedScheduler, options: EngineOptions) -> Self {
        let state = match store.load_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => AppSnapshot::default(),
            Err(e) => {
                warn!(error = %e, "failed to load snapshot; starting from defaults");
                AppSnapshot::default()
            }
        };
        Self::new(state, store, scheduler, options)
    }

    /// Load, make sure a companion exists, and reconcile the gap since the
    /// last run.
    pub fn open(
        store: SharedStore,
        scheduler: SharedScheduler,
        options: EngineOptions,
        now: DateTime<Utc>,
    ) -> Self {
        let mut engine = Self::load(store, scheduler, options);
        engine.ensure_initial_pet(now);
        engine.resume(now);
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &AppSnapshot {
        &self.state
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.state.active_task()
    }

    pub fn current_pet(&self) -> Option<&Pet> {
        self.state.current_pet()
    }

    pub fn pending_check_ins(&self) -> usize {
        self.pending.len()
    }

    /// Take all events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// When `tick()` next has work: the earliest armed timer or the next
    /// calendar day boundary.
    pub fn next_wakeup(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = next_midnight(now, self.options.utc_offset);
        match self.timers.next_due() {
            Some(due) => due.min(midnight),
            None => midnight,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> Status {
        let task = self.state.active_task();
        Status {
            phase: task.map(|t| t.phase(now)).unwrap_or(TaskPhase::Idle),
            task: task.map(|t| TaskStatus::of(t, now)),
            pet: self.state.current_pet().map(PetStatus::from),
            streak: self.state.streak.clone(),
            coins: self.state.currency.coins,
            counters: self.state.counters,
            pending_check_ins: self.pending.len(),
            next_wakeup: self.next_wakeup(now),
            at: now,
        }
    }

    // ── Task commands ────────────────────────────────────────────────

    /// Create an inert task.
    pub fn create_task(
        &mut self,
        title: &str,
        duration: Duration,
        check_in_interval: Duration,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        self.tick(now);
        let task = Task::new(title, duration, check_in_interval, now)?;
        debug!(task_id = %task.id, "task created");
        self.state.tasks.push(task.clone());
        self.persist();
        Ok(task)
    }

    /// Activate `task_id` and arm its timers.
    ///
    /// # Errors
    /// `Conflict` if a task is already active, `Precondition` if no living
    /// companion is selected or the task already ran.
    pub fn start(&mut self, task_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.tick(now);
        if let Some(active) = self.state.active_task() {
            return Err(CoreError::Conflict(format!(
                "task {} is already active",
                active.id
            )));
        }
        let pet_id = match self.state.current_pet() {
            Some(pet) if pet.is_alive() => pet.id.clone(),
            _ => {
                return Err(CoreError::Precondition(
                    "no living companion is selected".into(),
                ))
            }
        };
        let task = self
            .state
            .task_mut(task_id)
            .ok_or_else(|| CoreError::not_found("task", task_id))?;
        if task.is_started() {
            return Err(CoreError::Precondition(format!(
                "task {task_id} has already run; create a new task"
            )));
        }

        task.activate(now, Some(pet_id.clone()))?;
        let end_time = task.end_time.unwrap_or(now);
        info!(task_id, pet_id = %pet_id, %end_time, "task started");
        self.events.push(Event::TaskStarted {
            task_id: task_id.to_string(),
            pet_id: Some(pet_id),
            end_time,
            at: now,
        });

        self.persist();
        self.arm_timers(task_id);
        self.schedule_alerts(task_id, now);
        Ok(())
    }

    /// Hand evidence to the oracle. The verdict is applied later with
    /// [`Engine::resolve_check_in`].
    ///
    /// # Errors
    /// `NoActiveTask` without a running task, `CheckInNotDue` unless the
    /// next check-in window is open at `now`.
    pub fn submit_check_in(&mut self, evidence: Evidence, now: DateTime<Utc>) -> Result<CheckInTicket> {
        self.tick(now);
        let task = self.state.active_task().ok_or(CoreError::NoActiveTask)?;
        if !task.accepts_check_in(now) {
            let due_at = task.next_check_in_time().unwrap_or(now);
            debug!(task_id = %task.id, %due_at, "check-in outside its window rejected");
            return Err(CoreError::CheckInNotDue { due_at });
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let task_id = task.id.clone();
        self.pending.insert(
            ticket,
            PendingCheckIn {
                task_id: task_id.clone(),
                window: task.check_ins.len(),
                evidence,
                submitted_at: now,
            },
        );
        debug!(task_id = %task_id, ticket, "check-in submitted");
        self.events.push(Event::CheckInSubmitted {
            task_id,
            ticket,
            at: now,
        });
        Ok(CheckInTicket(ticket))
    }

    /// Apply the oracle's verdict for `ticket`.
    ///
    /// Due timers up to `now` fire first. If one of them already resolved
    /// the window the ticket was submitted for, the verdict is dropped.
    pub fn resolve_check_in(
        &mut self,
        ticket: CheckInTicket,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<CheckInResolution> {
        let pending = self
            .pending
            .remove(&ticket.0)
            .ok_or_else(|| CoreError::not_found("check-in ticket", ticket.0.to_string()))?;
        self.tick(now);

        let still_open = self
            .state
            .active_task()
            .is_some_and(|t| t.id == pending.task_id && t.check_ins.len() == pending.window);
        if !still_open {
            warn!(task_id = %pending.task_id, ticket = ticket.0, "stale verdict dropped");
            return Ok(CheckInResolution::Stale);
        }

        let check_in = CheckIn::resolved(pending.submitted_at, Some(pending.evidence), verified);
        let check_in_id = check_in.id.clone();
        if let Some(task) = self.state.task_mut(&pending.task_id) {
            task.check_ins.push(check_in);
        }

        if verified {
            self.reward_check_in(&pending.task_id, now);
            self.events.push(Event::CheckInVerified {
                task_id: pending.task_id.clone(),
                check_in_id: check_in_id.clone(),
                at: now,
            });
        } else {
            self.penalize_owner(&pending.task_id, now);
            self.state.counters.record_miss();
            self.events.push(Event::CheckInFailed {
                task_id: pending.task_id.clone(),
                check_in_id: check_in_id.clone(),
                at: now,
            });
        }
        info!(task_id = %pending.task_id, verified, "check-in resolved");

        self.evaluate_badges(now);
        self.persist();
        self.arm_timers(&pending.task_id);
        self.schedule_alerts(&pending.task_id, now);
        Ok(CheckInResolution::Applied {
            check_in_id,
            verified,
        })
    }

    /// Abandon the active task with a double neglect penalty.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.tick(now);
        let task = self.state.active_task_mut().ok_or(CoreError::NoActiveTask)?;
        let task_id = task.id.clone();

        let mut synthetic = None;
        if let (Some(window), Some(end)) = (task.next_window(), task.end_time) {
            if window.due_at <= end {
                task.check_ins.push(CheckIn::missed(window.due_at));
                synthetic = Some(window.due_at);
            }
        }
        task.terminate(TaskOutcome::Cancelled);

        if let Some(due_at) = synthetic {
            self.events.push(Event::CheckInMissed {
                task_id: task_id.clone(),
                due_at,
                replayed: false,
            });
        }
        self.penalize_owner(&task_id, now);
        self.penalize_owner(&task_id, now);
        self.state.counters.record_miss();
        self.close_task(&task_id);
        info!(task_id = %task_id, "task cancelled");
        self.events.push(Event::TaskCancelled {
            task_id,
            at: now,
        });
        self.persist();
        Ok(())
    }

    // ── Companion commands ───────────────────────────────────────────

    /// Adopt a companion. A free type is only available as the first pet;
    /// paid types are bought elsewhere and always accepted.
    pub fn add_pet(&mut self, name: &str, pet_type: PetType, now: DateTime<Utc>) -> Result<Pet> {
        self.tick(now);
        if name.trim().is_empty() {
            return Err(ValidationError::invalid("name", "must not be empty").into());
        }
        if pet_type.is_free() && !self.state.pets.is_empty() {
            return Err(CoreError::Precondition(format!(
                "a free {pet_type} is only available as the first companion"
            )));
        }
        let pet = self.adopt(name.trim(), pet_type, now);
        self.evaluate_badges(now);
        self.persist();
        Ok(pet)
    }

    pub fn select_pet(&mut self, pet_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.tick(now);
        if self.state.pet(pet_id).is_none() {
            return Err(CoreError::not_found("pet", pet_id));
        }
        self.state.current_pet_id = Some(pet_id.to_string());
        debug!(pet_id, "companion selected");
        self.persist();
        Ok(())
    }

    /// Remove a companion. Rejected while it owns the active task.
    pub fn delete_pet(&mut self, pet_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.tick(now);
        if self
            .state
            .active_task()
            .is_some_and(|t| t.pet_id.as_deref() == Some(pet_id))
        {
            return Err(CoreError::Conflict(format!(
                "pet {pet_id} owns the active task"
            )));
        }
        let before = self.state.pets.len();
        self.state.pets.retain(|p| p.id != pet_id);
        if self.state.pets.len() == before {
            return Err(CoreError::not_found("pet", pet_id));
        }
        if self.state.current_pet_id.as_deref() == Some(pet_id) {
            self.state.current_pet_id = self.state.pets.first().map(|p| p.id.clone());
        }
        self.persist();
        Ok(())
    }

    pub fn upgrade_to_premium(&mut self) {
        self.state.settings.is_premium = true;
        self.state.settings.max_pets = PREMIUM_MAX_PETS;
        self.persist();
    }

    // ── Time ─────────────────────────────────────────────────────────

    /// Fire every timer due at or before `now`, then run daily maintenance.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        while let Some(timer) = self.timers.pop_due(now) {
            self.fire(timer, now);
        }
        self.run_daily_maintenance(now);
    }

    /// Reconstruct state after an unobserved gap: catch up deterioration,
    /// replay closed windows of the active task, then finalize it or re-arm
    /// its timers.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.run_daily_maintenance(now);

        let active: Vec<String> = self
            .state
            .tasks
            .iter()
            .filter(|t| t.active)
            .map(|t| t.id.clone())
            .collect();
        for extra in active.iter().skip(1) {
            self.discard(extra, "another task was already active".into(), now);
        }
        if let Some(task_id) = active.first() {
            self.replay(task_id, now, true);
        }
        self.persist();
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn fire(&mut self, timer: ArmedTimer, now: DateTime<Utc>) {
        let is_current = self
            .state
            .active_task()
            .is_some_and(|t| t.id == timer.task_id);
        if !is_current {
            warn!(task_id = %timer.task_id, kind = ?timer.kind, "stale timer ignored");
            return;
        }
        debug!(task_id = %timer.task_id, kind = ?timer.kind, due_at = %timer.due_at, "timer fired");

        match timer.kind {
            TimerKind::NextCheckIn => {
                let window = self.state.task(&timer.task_id).and_then(Task::next_window);
                if let Some(window) = window {
                    self.events.push(Event::CheckInDue {
                        task_id: timer.task_id,
                        due_at: window.due_at,
                        deadline: window.deadline,
                    });
                }
            }
            TimerKind::Deadline => {
                self.replay(&timer.task_id, now, false);
                self.persist();
            }
            TimerKind::Completion => {
                self.finalize(&timer.task_id, now);
            }
        }
    }

    /// Replay closed windows of `task_id`, then finalize or re-arm.
    fn replay(&mut self, task_id: &str, now: DateTime<Utc>, after_gap: bool) {
        let Some(task) = self.state.task_mut(task_id) else {
            return;
        };
        match reconcile(task, now) {
            Reconciliation::Anomaly { reason } => self.discard(task_id, reason, now),
            Reconciliation::Replayed { missed, finished } => {
                self.apply_missed(task_id, &missed, after_gap, now);
                if finished {
                    self.finalize(task_id, now);
                } else {
                    self.evaluate_badges(now);
                    self.arm_timers(task_id);
                    self.schedule_alerts(task_id, now);
                }
            }
        }
    }

    fn apply_missed(
        &mut self,
        task_id: &str,
        missed: &[DateTime<Utc>],
        replayed: bool,
        now: DateTime<Utc>,
    ) {
        for due_at in missed {
            info!(task_id, %due_at, replayed, "check-in missed");
            self.events.push(Event::CheckInMissed {
                task_id: task_id.to_string(),
                due_at: *due_at,
                replayed,
            });
            self.penalize_owner(task_id, now);
            self.state.counters.record_miss();
        }
    }

    /// Close out the active task at its end time.
    fn finalize(&mut self, task_id: &str, now: DateTime<Utc>) {
        let Some(task) = self.state.task_mut(task_id) else {
            return;
        };
        if !task.active {
            return;
        }
        match reconcile(task, now) {
            Reconciliation::Anomaly { reason } => {
                self.discard(task_id, reason, now);
                return;
            }
            Reconciliation::Replayed { missed, .. } => {
                self.apply_missed(task_id, &missed, false, now);
            }
        }

        let Some(task) = self.state.task_mut(task_id) else {
            return;
        };
        let completion_rate = task.completion_rate();
        let successful = schedule::is_successful(completion_rate);
        task.terminate(TaskOutcome::Completed { successful });
        let finished_at = task.end_time.map_or(now, |end| end.min(now));
        let pet_id = task.pet_id.clone();

        if let Some(pet) = pet_id.as_deref().and_then(|id| self.state.pet_mut(id)) {
            pet.record_task(task_id);
        }

        if successful {
            self.state.counters.completed_tasks += 1;
            self.state.currency.credit(TASK_COINS);
            let streak_days = self.state.streak.current;
            let rewarded = match pet_id.as_deref().and_then(|id| self.state.pet_mut(id)) {
                Some(pet) if pet.is_alive() => {
                    let outcome = pet.reward(TASK_XP, streak_days);
                    pet.feed(now);
                    pet.consecutive_days += 1;
                    if outcome.levels_gained > 0 {
                        self.events.push(Event::PetLevelUp {
                            pet_id: pet.id.clone(),
                            level: pet.level,
                        });
                    }
                    true
                }
                _ => false,
            };
            if rewarded {
                let today = local_day(finished_at, self.options.utc_offset);
                if self.state.streak.update(today) != StreakUpdate::Unchanged {
                    self.events.push(Event::StreakAdvanced {
                        current: self.state.streak.current,
                        longest: self.state.streak.longest,
                    });
                }
            }
        } else {
            self.penalize_owner(task_id, now);
        }

        self.close_task(task_id);
        info!(task_id, successful, completion_rate, "task completed");
        self.events.push(Event::TaskCompleted {
            task_id: task_id.to_string(),
            successful,
            completion_rate,
            at: now,
        });
        self.evaluate_badges(now);
        self.persist();
    }

    /// Terminate an inconsistent task without rewards or penalties.
    fn discard(&mut self, task_id: &str, reason: String, now: DateTime<Utc>) {
        let Some(task) = self.state.task_mut(task_id) else {
            return;
        };
        task.terminate(TaskOutcome::Discarded);
        warn!(task_id, %reason, "task discarded as data anomaly");
        self.close_task(task_id);
        self.events.push(Event::TaskDiscarded {
            task_id: task_id.to_string(),
            reason,
            at: now,
        });
    }

    /// Invalidate everything still tied to a task that just ended.
    fn close_task(&mut self, task_id: &str) {
        let owns_timers = self.timers.armed().any(|t| t.task_id == task_id);
        if owns_timers {
            self.timers.disarm_all();
        }
        if let Err(e) = self.scheduler.cancel(task_id) {
            warn!(task_id, error = %e, "failed to cancel alerts");
        }
    }

    /// Arm the next-check-in, deadline and completion timers for the
    /// active task from its current recorded state.
    fn arm_timers(&mut self, task_id: &str) {
        let Some(task) = self.state.task(task_id).filter(|t| t.active) else {
            return;
        };
        let (Some(window), Some(end)) = (task.next_window(), task.end_time) else {
            return;
        };

        if window.due_at <= end {
            self.timers.arm(TimerKind::NextCheckIn, task_id, window.due_at);
        } else {
            self.timers.disarm(TimerKind::NextCheckIn);
        }
        if window.deadline <= end {
            self.timers.arm(TimerKind::Deadline, task_id, window.deadline);
        } else {
            self.timers.disarm(TimerKind::Deadline);
        }
        let completion_armed = self
            .timers
            .get(TimerKind::Completion)
            .is_some_and(|t| t.task_id == task_id && t.due_at == end);
        if !completion_armed {
            self.timers.arm(TimerKind::Completion, task_id, end);
        }
    }

    /// Replace the alert plan of `task_id` with one following its current anchor.
    fn schedule_alerts(&self, task_id: &str, now: DateTime<Utc>) {
        let Some(task) = self.state.task(task_id) else {
            return;
        };
        let alerts = plan_alerts(task, now, &self.state.settings);
        if let Err(e) = self.scheduler.schedule(task_id, &alerts) {
            warn!(task_id, error = %e, "failed to schedule alerts");
        }
    }

    fn reward_check_in(&mut self, task_id: &str, now: DateTime<Utc>) {
        self.state.counters.record_verified();
        self.state.currency.credit(CHECK_IN_COINS);
        let streak_days = self.state.streak.current;
        let owner = self.state.task(task_id).and_then(|t| t.pet_id.clone());
        if let Some(pet) = owner.as_deref().and_then(|id| self.state.pet_mut(id)) {
            let outcome = pet.reward(CHECK_IN_XP, streak_days);
            pet.feed(now);
            if outcome.levels_gained > 0 {
                self.events.push(Event::PetLevelUp {
                    pet_id: pet.id.clone(),
                    level: pet.level,
                });
            }
        }
    }

    /// One neglect penalty for the companion that owns `task_id`.
    fn penalize_owner(&mut self, task_id: &str, now: DateTime<Utc>) {
        let owner = self.state.task(task_id).and_then(|t| t.pet_id.clone());
        let Some(pet) = owner.as_deref().and_then(|id| self.state.pet_mut(id)) else {
            return;
        };
        if pet.neglect(now) {
            info!(pet_id = %pet.id, "companion died");
            self.events.push(Event::PetDied {
                pet_id: pet.id.clone(),
                at: now,
            });
        }
    }

    fn evaluate_badges(&mut self, now: DateTime<Utc>) {
        let stats = BadgeStats::collect(
            &self.state.tasks,
            &self.state.pets,
            &self.state.streak,
            &self.state.counters,
            self.options.utc_offset,
        );
        for badge_id in badges::evaluate(&mut self.state.badges, &stats, now) {
            let points = badge_id.definition().points;
            self.state.counters.total_points += u64::from(points);
            self.state.currency.credit(BADGE_COINS);
            info!(badge = %badge_id.key(), points, "badge unlocked");
            self.events.push(Event::BadgeUnlocked {
                badge_id,
                points,
                at: now,
            });
        }
    }

    /// Once per calendar day, while no task runs: catch up deterioration of
    /// the selected companion.
    fn run_daily_maintenance(&mut self, now: DateTime<Utc>) {
        let today = local_day(now, self.options.utc_offset);
        if self.last_maintenance_day == Some(today) || self.state.active_task().is_some() {
            return;
        }
        self.last_maintenance_day = Some(today);

        let offset = self.options.utc_offset;
        let Some(pet) = self.state.current_pet_mut() else {
            return;
        };
        if !pet.is_alive() {
            return;
        }
        if pet.last_fed_at.is_none() {
            // never fed: start the grace period now
            pet.feed(now);
            self.persist();
            return;
        }
        let Some(applied) = deterioration::apply(pet, now, offset) else {
            return;
        };
        let (pet_id, health, happiness) = (pet.id.clone(), pet.health, pet.happiness);
        info!(pet_id = %pet_id, days = applied.days, health, "companion deteriorated");
        self.events.push(Event::PetDeteriorated {
            pet_id: pet_id.clone(),
            days: applied.days,
            health,
            happiness,
        });
        if applied.died {
            self.events.push(Event::PetDied { pet_id, at: now });
        }
        self.persist();
    }

    fn ensure_initial_pet(&mut self, now: DateTime<Utc>) {
        if self.state.pets.is_empty() {
            self.adopt(INITIAL_PET_NAME, PetType::Cat, now);
            self.persist();
            return;
        }
        let dangling = self.state.current_pet().is_none();
        if dangling {
            self.state.current_pet_id = self
                .state
                .pets
                .iter()
                .find(|p| p.is_alive())
                .or_else(|| self.state.pets.first())
                .map(|p| p.id.clone());
        }
    }

    fn adopt(&mut self, name: &str, pet_type: PetType, now: DateTime<Utc>) -> Pet {
        let mut pet = Pet::new(name, pet_type, now);
        pet.feed(now);
        info!(pet_id = %pet.id, %pet_type, "companion adopted");
        self.events.push(Event::PetAdopted {
            pet_id: pet.id.clone(),
            pet_type,
            at: now,
        });
        if self.state.current_pet_id.is_none() || self.state.current_pet().is_none() {
            self.state.current_pet_id = Some(pet.id.clone());
        }
        self.state.pets.push(pet.clone());
        pet
    }

    /// Write the snapshot. Failures are logged; in-memory state stays
    /// authoritative until the next successful write.
    fn persist(&self) {
        if let Err(e) = self.store.save_snapshot(&self.state) {
            warn!(error = %e, "failed to persist snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopScheduler;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn engine() -> Engine {
        Engine::open(
            Arc::new(MemoryStore::new()),
            Arc::new(NoopScheduler),
            EngineOptions::default(),
            at(0),
        )
    }

    fn started(engine: &mut Engine, duration: i64, interval: i64) -> String {
        let task = engine
            .create_task("Study", Duration::seconds(duration), Duration::seconds(interval), at(0))
            .unwrap();
        engine.start(&task.id, at(0)).unwrap();
        task.id
    }

    #[test]
    fn open_creates_initial_pet() {
        let engine = engine();
        let pet = engine.current_pet().unwrap();
        assert_eq!(pet.name, INITIAL_PET_NAME);
        assert_eq!(pet.pet_type, PetType::Cat);
        assert_eq!(pet.last_fed_at, Some(at(0)));
    }

    #[test]
    fn start_arms_three_timers() {
        let mut engine = engine();
        started(&mut engine, 3600, 720);
        assert_eq!(engine.timers().get(TimerKind::NextCheckIn).unwrap().due_at, at(720));
        assert_eq!(engine.timers().get(TimerKind::Deadline).unwrap().due_at, at(864));
        assert_eq!(engine.timers().get(TimerKind::Completion).unwrap().due_at, at(3600));
    }

    #[test]
    fn second_start_conflicts() {
        let mut engine = engine();
        started(&mut engine, 3600, 720);
        let other = engine
            .create_task("Other", Duration::seconds(60), Duration::seconds(30), at(1))
            .unwrap();
        let err = engine.start(&other.id, at(1)).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert!(!engine.snapshot().task(&other.id).unwrap().active);
    }

    #[test]
    fn check_in_without_task_is_rejected() {
        let mut engine = engine();
        let err = engine
            .submit_check_in(Evidence::new(b"x".to_vec()), at(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::NoActiveTask));
    }

    #[test]
    fn check_in_before_due_is_rejected() {
        let mut engine = engine();
        started(&mut engine, 3600, 720);
        let err = engine
            .submit_check_in(Evidence::new(b"photo".to_vec()), at(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::CheckInNotDue { due_at } if due_at == at(720)));
        assert_eq!(engine.pending_check_ins(), 0);
        assert_eq!(engine.status(at(1)).phase, TaskPhase::Running);
    }

    #[test]
    fn early_check_ins_cannot_be_stacked() {
        let mut engine = engine();
        let id = started(&mut engine, 3600, 720);
        let mut applied = 0;
        for secs in [1, 2, 3, 720, 721, 722, 1440] {
            if let Ok(ticket) = engine.submit_check_in(Evidence::new(b"photo".to_vec()), at(secs)) {
                engine.resolve_check_in(ticket, true, at(secs)).unwrap();
                applied += 1;
            }
        }
        assert_eq!(applied, 2);
        let task = engine.snapshot().task(&id).unwrap();
        assert_eq!(task.verified_check_ins(), 2);
        assert!(task.completion_rate() <= 1.0);
    }

    #[test]
    fn deadline_timer_records_one_miss() {
        let mut engine = engine();
        let id = started(&mut engine, 3600, 720);
        engine.tick(at(864));
        let task = engine.snapshot().task(&id).unwrap();
        assert_eq!(task.missed_check_ins(), 1);
        assert_eq!(engine.current_pet().unwrap().health, 85);
        assert_eq!(engine.timers().get(TimerKind::NextCheckIn).unwrap().due_at, at(1440));
    }

    #[test]
    fn verdict_after_deadline_is_stale() {
        let mut engine = engine();
        let id = started(&mut engine, 3600, 720);
        let ticket = engine
            .submit_check_in(Evidence::new(b"photo".to_vec()), at(800))
            .unwrap();
        let resolution = engine.resolve_check_in(ticket, true, at(900)).unwrap();
        assert_eq!(resolution, CheckInResolution::Stale);
        let task = engine.snapshot().task(&id).unwrap();
        assert_eq!(task.check_ins.len(), 1);
        assert!(task.check_ins[0].is_missed());
    }

    #[test]
    fn cancel_applies_double_penalty() {
        let mut engine = engine();
        let id = started(&mut engine, 3600, 720);
        engine.cancel(at(100)).unwrap();
        let task = engine.snapshot().task(&id).unwrap();
        assert_eq!(task.outcome, Some(TaskOutcome::Cancelled));
        assert_eq!(task.missed_check_ins(), 1);
        assert_eq!(engine.current_pet().unwrap().health, 70);
        assert!(engine.timers().is_empty());
        assert!(matches!(engine.cancel(at(101)), Err(CoreError::NoActiveTask)));
    }

    #[test]
    fn free_pet_only_first() {
        let mut engine = engine();
        let err = engine.add_pet("Tom", PetType::Cat, at(1)).unwrap_err();
        assert!(matches!(err, CoreError::Precondition(_)));
        let dragon = engine.add_pet("Smaug", PetType::Dragon, at(1)).unwrap();
        assert_ne!(engine.current_pet().unwrap().id, dragon.id);
        engine.select_pet(&dragon.id, at(2)).unwrap();
        assert_eq!(engine.current_pet().unwrap().id, dragon.id);
    }

    #[test]
    fn owner_of_active_task_cannot_be_deleted() {
        let mut engine = engine();
        started(&mut engine, 3600, 720);
        let owner = engine.current_pet().unwrap().id.clone();
        assert!(matches!(
            engine.delete_pet(&owner, at(5)),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn next_wakeup_prefers_earliest_timer() {
        let mut engine = engine();
        assert_eq!(
            engine.next_wakeup(at(0)),
            Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap()
        );
        started(&mut engine, 3600, 720);
        assert_eq!(engine.next_wakeup(at(0)), at(720));
    }
}
