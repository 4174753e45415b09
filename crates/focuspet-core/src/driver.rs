//! Async driver that owns an [`Engine`] on the wall clock.
//!
//! The engine never reads the clock and never sleeps. The driver is the one
//! task that does both: it serializes commands from any number of
//! [`DriverHandle`]s, hands evidence to the [`VerificationOracle`] off the
//! command path, feeds verdicts back in, and calls `tick()` whenever the
//! engine's next wake-up comes around.
//!
//! ```ignore
//! let (handle, mut events, join) = Driver::new(engine, oracle).spawn();
//! let task = handle.create_task("Study", hours(1), minutes(12)).await?;
//! handle.start(&task.id).await?;
//! while let Some(event) = events.recv().await { /* ... */ }
//! ```

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::oracle::VerificationOracle;
use crate::task::{Evidence, Task};
use crate::timer::{CheckInResolution, CheckInTicket, Engine, Status};

const DEFAULT_VERIFICATION_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const COMMAND_BUFFER: usize = 32;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    CreateTask {
        title: String,
        duration: Duration,
        check_in_interval: Duration,
        reply: Reply<Task>,
    },
    Start {
        task_id: String,
        reply: Reply<()>,
    },
    CheckIn {
        evidence: Evidence,
        reply: Reply<CheckInReceipt>,
    },
    Cancel {
        reply: Reply<()>,
    },
    Status {
        reply: oneshot::Sender<Status>,
    },
    Shutdown,
}

/// A submitted check-in. Await [`CheckInReceipt::resolution`] for the
/// oracle's verdict as applied by the engine.
#[derive(Debug)]
pub struct CheckInReceipt {
    pub ticket: CheckInTicket,
    resolution: oneshot::Receiver<Result<CheckInResolution>>,
}

impl CheckInReceipt {
    pub async fn resolution(self) -> Result<CheckInResolution> {
        self.resolution.await.map_err(|_| CoreError::DriverStopped)?
    }
}

/// Cloneable front end for a running [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::CreateTask { .. } => "CreateTask",
            Command::Start { .. } => "Start",
            Command::CheckIn { .. } => "CheckIn",
            Command::Cancel { .. } => "Cancel",
            Command::Status { .. } => "Status",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl DriverHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| CoreError::DriverStopped)?;
        rx.await.map_err(|_| CoreError::DriverStopped)?
    }

    pub async fn create_task(
        &self,
        title: &str,
        duration: Duration,
        check_in_interval: Duration,
    ) -> Result<Task> {
        let title = title.to_string();
        self.request(|reply| Command::CreateTask {
            title,
            duration,
            check_in_interval,
            reply,
        })
        .await
    }

    pub async fn start(&self, task_id: &str) -> Result<()> {
        let task_id = task_id.to_string();
        self.request(|reply| Command::Start { task_id, reply }).await
    }

    /// Submit evidence for the open window. Returns as soon as the engine
    /// has accepted the submission; verification runs in the background.
    pub async fn check_in(&self, evidence: Evidence) -> Result<CheckInReceipt> {
        self.request(|reply| Command::CheckIn { evidence, reply }).await
    }

    pub async fn cancel(&self) -> Result<()> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    pub async fn status(&self) -> Result<Status> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .await
            .map_err(|_| CoreError::DriverStopped)?;
        rx.await.map_err(|_| CoreError::DriverStopped)
    }

    /// Ask the driver to stop. Pending verdicts are abandoned.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// Single writer for an [`Engine`].
pub struct Driver {
    engine: Engine,
    oracle: Arc<dyn VerificationOracle>,
    verification_timeout: std::time::Duration,
    stop_when_idle: bool,
}

impl Driver {
    pub fn new(engine: Engine, oracle: Arc<dyn VerificationOracle>) -> Self {
        Self {
            engine,
            oracle,
            verification_timeout: DEFAULT_VERIFICATION_TIMEOUT,
            stop_when_idle: false,
        }
    }

    /// Verdicts slower than `timeout` count as failed verification.
    pub fn with_verification_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.verification_timeout = timeout;
        self
    }

    /// Exit on its own once no task is active and nothing is pending.
    pub fn stop_when_idle(mut self, stop: bool) -> Self {
        self.stop_when_idle = stop;
        self
    }

    /// Run on the current tokio runtime.
    ///
    /// Returns the handle, the event stream, and a join handle that yields
    /// the engine back when the driver stops.
    pub fn spawn(self) -> (DriverHandle, mpsc::UnboundedReceiver<Event>, JoinHandle<Engine>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(self.run(command_rx, event_tx));
        (DriverHandle { commands: command_tx }, event_rx, join)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Engine {
        let (verdict_tx, mut verdicts) = mpsc::unbounded_channel::<(CheckInTicket, bool)>();
        let mut waiters: HashMap<CheckInTicket, Reply<CheckInResolution>> = HashMap::new();
        info!("engine driver started");

        loop {
            self.engine.tick(Utc::now());
            for event in self.engine.drain_events() {
                let _ = events.send(event);
            }
            if self.stop_when_idle
                && self.engine.active_task().is_none()
                && self.engine.pending_check_ins() == 0
            {
                debug!("no active task; driver stopping");
                break;
            }

            let now = Utc::now();
            let sleep_for = sleep_duration(now, self.engine.next_wakeup(now));

            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle(command, &verdict_tx, &mut waiters),
                },
                Some((ticket, verified)) = verdicts.recv() => {
                    let result = self.engine.resolve_check_in(ticket, verified, Utc::now());
                    if let Err(e) = &result {
                        warn!(ticket = ticket.0, error = %e, "failed to apply verdict");
                    }
                    if let Some(waiter) = waiters.remove(&ticket) {
                        let _ = waiter.send(result);
                    }
                },
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        for event in self.engine.drain_events() {
            let _ = events.send(event);
        }
        info!("engine driver stopped");
        self.engine
    }

    fn handle(
        &mut self,
        command: Command,
        verdict_tx: &mpsc::UnboundedSender<(CheckInTicket, bool)>,
        waiters: &mut HashMap<CheckInTicket, Reply<CheckInResolution>>,
    ) {
        debug!(?command, "driver command");
        let now = Utc::now();
        match command {
            Command::CreateTask {
                title,
                duration,
                check_in_interval,
                reply,
            } => {
                let _ = reply.send(self.engine.create_task(&title, duration, check_in_interval, now));
            }
            Command::Start { task_id, reply } => {
                let _ = reply.send(self.engine.start(&task_id, now));
            }
            Command::CheckIn { evidence, reply } => {
                let ticket = match self.engine.submit_check_in(evidence.clone(), now) {
                    Ok(ticket) => ticket,
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return;
                    }
                };
                let (waiter, resolution) = oneshot::channel();
                waiters.insert(ticket, waiter);
                self.spawn_verification(ticket, evidence, verdict_tx.clone());
                let _ = reply.send(Ok(CheckInReceipt { ticket, resolution }));
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.engine.cancel(now));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.engine.status(now));
            }
            Command::Shutdown => {}
        }
    }

    fn spawn_verification(
        &self,
        ticket: CheckInTicket,
        evidence: Evidence,
        verdict_tx: mpsc::UnboundedSender<(CheckInTicket, bool)>,
    ) {
        let oracle = Arc::clone(&self.oracle);
        let timeout = self.verification_timeout;
        tokio::spawn(async move {
            let verified = match tokio::time::timeout(timeout, oracle.verify(&evidence)).await {
                Ok(Ok(verified)) => verified,
                Ok(Err(e)) => {
                    warn!(ticket = ticket.0, error = %e, "verification failed");
                    false
                }
                Err(_) => {
                    warn!(ticket = ticket.0, ?timeout, "verification timed out");
                    false
                }
            };
            let _ = verdict_tx.send((ticket, verified));
        });
    }
}

fn sleep_duration(now: DateTime<Utc>, wakeup: DateTime<Utc>) -> std::time::Duration {
    (wakeup - now).to_std().unwrap_or(std::time::Duration::ZERO)
}
