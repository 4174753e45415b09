mod engine;
mod queue;
mod status;

pub use engine::{
    CheckInResolution, CheckInTicket, Engine, EngineOptions, SharedScheduler, SharedStore,
    INITIAL_PET_NAME,
};
pub use queue::{ArmedTimer, TimerKind, TimerQueue};
pub use status::{PetStatus, Status, TaskStatus};
