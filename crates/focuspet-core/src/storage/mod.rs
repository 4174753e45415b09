mod config;
pub mod database;
pub mod memory;
pub mod snapshot;

pub use config::{CalendarConfig, Config, LogConfig, VerificationConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use snapshot::{AppSnapshot, Settings};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Durable load/save of the whole application snapshot.
pub trait SnapshotStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load_snapshot(&self) -> Result<Option<AppSnapshot>>;

    fn save_snapshot(&self, snapshot: &AppSnapshot) -> Result<()>;
}

/// Returns the data directory, creating it if needed.
///
/// `$FOCUSPET_HOME` wins when set. Otherwise `~/.config/focuspet/`, or
/// `~/.config/focuspet-dev/` when `FOCUSPET_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("FOCUSPET_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSPET_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focuspet-dev")
            } else {
                base_dir.join("focuspet")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
