use chrono::{Duration, Utc};
use clap::Subcommand;
use focuspet_core::{
    CheckInResolution, Driver, Evidence, SimulatedOracle, TaskStatus, ValidationError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::{print_json, runtime, CliResult, Session};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Duration in minutes
        #[arg(long, default_value = "60")]
        duration: i64,
        /// Minutes between check-ins
        #[arg(long, default_value = "12")]
        interval: i64,
    },
    /// Start a task with the current companion
    Start {
        /// Task ID
        id: String,
    },
    /// Submit evidence for the open check-in window
    CheckIn {
        /// File whose bytes are sent to the verifier
        #[arg(long)]
        evidence: PathBuf,
    },
    /// Abandon the active task
    Cancel,
    /// Show the active task, companion and counters
    Status,
    /// List all tasks
    List,
}

#[derive(Serialize)]
struct CheckInReport {
    ticket: u64,
    evidence_sha256: String,
    outcome: CheckInResolution,
}

pub fn run(action: TaskAction) -> CliResult {
    let mut session = Session::open()?;

    match action {
        TaskAction::Create {
            title,
            duration,
            interval,
        } => {
            let task = session.engine.create_task(
                &title,
                minutes("duration", duration)?,
                minutes("check_in_interval", interval)?,
                Utc::now(),
            )?;
            print_json(&task)?;
        }
        TaskAction::Start { id } => {
            session.engine.start(&id, Utc::now())?;
            print_json(&session.engine.status(Utc::now()))?;
        }
        TaskAction::CheckIn { evidence } => {
            let evidence = Evidence::new(std::fs::read(&evidence)?);
            let evidence_sha256 = evidence.digest();
            let oracle = SimulatedOracle::new(session.config.verification.simulated_success_rate);
            let driver = Driver::new(session.engine, Arc::new(oracle))
                .with_verification_timeout(session.config.verification_timeout());

            let rt = runtime()?;
            let (ticket, outcome) = rt.block_on(async move {
                let (handle, _events, join) = driver.spawn();
                let outcome = match handle.check_in(evidence).await {
                    Ok(receipt) => {
                        let ticket = receipt.ticket.0;
                        receipt.resolution().await.map(|r| (ticket, r))
                    }
                    Err(e) => Err(e),
                };
                handle.shutdown().await;
                let _ = join.await;
                outcome
            })?;
            print_json(&CheckInReport {
                ticket,
                evidence_sha256,
                outcome,
            })?;
        }
        TaskAction::Cancel => {
            session.engine.cancel(Utc::now())?;
            print_json(&session.engine.status(Utc::now()))?;
        }
        TaskAction::Status => {
            print_json(&session.engine.status(Utc::now()))?;
        }
        TaskAction::List => {
            let now = Utc::now();
            let tasks: Vec<TaskStatus> = session
                .engine
                .snapshot()
                .tasks
                .iter()
                .map(|t| TaskStatus::of(t, now))
                .collect();
            print_json(&tasks)?;
        }
    }
    Ok(())
}

fn minutes(field: &str, value: i64) -> Result<Duration, ValidationError> {
    Duration::try_minutes(value).ok_or_else(|| ValidationError::invalid(field, "out of range"))
}

/// Drive the active task on the wall clock until it ends.
pub fn watch() -> CliResult {
    let session = Session::open()?;
    if session.engine.active_task().is_none() {
        return Err("no active task to watch".into());
    }
    let oracle = SimulatedOracle::new(session.config.verification.simulated_success_rate);
    let driver = Driver::new(session.engine, Arc::new(oracle))
        .with_verification_timeout(session.config.verification_timeout())
        .stop_when_idle(true);

    let rt = runtime()?;
    rt.block_on(async move {
        let (_handle, mut events, join) = driver.spawn();
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        }
        let _ = join.await;
    });
    Ok(())
}
