pub mod config;
pub mod pet;
pub mod rewards;
pub mod task;

use chrono::Utc;
use focuspet_core::{Config, Database, Engine, EngineOptions};
use serde::Serialize;
use std::sync::Arc;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Engine over the on-disk database, caught up to the current time.
pub struct Session {
    pub config: Config,
    pub db: Arc<Database>,
    pub engine: Engine,
}

impl Session {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load_or_default();
        let db = Arc::new(Database::open()?);
        let engine = Engine::open(
            db.clone(),
            db.clone(),
            EngineOptions::from_config(&config),
            Utc::now(),
        );
        Ok(Self { config, db, engine })
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Tokio runtime for commands that talk to the verification oracle.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
