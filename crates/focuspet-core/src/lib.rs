//! # FocusPet Core Library
//!
//! This library provides the core logic for FocusPet, a focus-session
//! tracker where the user's attention keeps a virtual companion alive.
//! All operations are available through a standalone CLI binary that is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Engine**: A wall-clock-based state machine that never reads the
//!   clock itself. Every command takes `now`; the caller invokes `tick()`
//!   when [`Engine::next_wakeup`] comes around
//! - **Driver**: A tokio task that owns the engine, runs verification off
//!   the command path, and sleeps until the next wake-up
//! - **Catch-up**: Windows and days that passed while the process was not
//!   running are replayed on startup with the same rules as live timers
//! - **Storage**: A JSON snapshot in SQLite and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Engine`]: Task, companion and reward state machine
//! - [`Driver`]: Async single writer for an engine
//! - [`Database`]: Snapshot and alert persistence
//! - [`Config`]: Application configuration management
//! - [`VerificationOracle`]: Trait for check-in verification

pub mod catch_up;
pub mod driver;
pub mod error;
pub mod events;
pub mod notify;
pub mod oracle;
pub mod pet;
pub mod rewards;
pub mod schedule;
pub mod storage;
pub mod task;
pub mod timer;

pub use driver::{CheckInReceipt, Driver, DriverHandle};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use notify::{Alert, AlertKind, NoopScheduler, NotificationScheduler};
pub use oracle::{FixedOracle, SimulatedOracle, VerificationOracle};
pub use pet::{HealthStatus, Pet, PetType};
pub use rewards::{Badge, BadgeId, BadgeView, Counters, Streak, VirtualCurrency};
pub use storage::{AppSnapshot, Config, Database, MemoryStore, Settings, SnapshotStore};
pub use task::{CheckIn, Evidence, Task, TaskOutcome, TaskPhase, VerificationResult};
pub use timer::{
    CheckInResolution, CheckInTicket, Engine, EngineOptions, PetStatus, Status, TaskStatus,
    TimerKind,
};
