//! Probe scheduling loop.
//!
//! The engine is a single Tokio task that owns the Idle/Running state and is
//! the only producer of [`EngineEvent`]s. Each run spawns a cycle task that
//! probes sequentially with fixed-delay spacing and reports every outcome
//! back to the engine tagged with its run generation. Reports from a run
//! that is no longer active are dropped, so nothing from a stopped run can
//! follow its `stopped` event.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::SessionConfig;
use crate::engine::message::{EngineCommand, EngineEvent};
use crate::log_buffer::LogLevel;
use crate::probe::{Probe, ProbeResult, ProbeSet};

/// Errors returned by [`EngineHandle`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine task is gone and no longer accepts commands.
    #[error("engine is not running")]
    Closed,
}

/// Receiving half of the engine's event stream.
pub type EngineEvents = mpsc::UnboundedReceiver<EngineEvent>;

/// Command side of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Send a raw command.
    ///
    /// The configuration of a `Start` command is assumed valid.
    pub fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands.send(command).map_err(|_| EngineError::Closed)
    }

    pub fn start(&self, config: SessionConfig) -> Result<(), EngineError> {
        self.send(EngineCommand::Start(config))
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop)
    }

    /// Halt any active run and terminate the engine task.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Spawn an engine on the current Tokio runtime.
pub fn spawn(probes: ProbeSet) -> (EngineHandle, EngineEvents) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (report_tx, report_rx) = mpsc::unbounded_channel();

    let engine = Engine {
        probes,
        events: event_tx,
        reports: report_tx,
        active: None,
        next_generation: 0,
    };
    tokio::spawn(engine.run(command_rx, report_rx));

    (
        EngineHandle {
            commands: command_tx,
        },
        event_rx,
    )
}

// =============================================================================
// Engine task
// =============================================================================

/// Outcome of one cycle as seen by the cycle task.
#[derive(Debug)]
enum CycleOutcome {
    Completed(ProbeResult),
    /// The probe panicked or was cancelled by the runtime.
    Fault(String),
}

#[derive(Debug)]
struct CycleReport {
    generation: u64,
    outcome: CycleOutcome,
}

/// The run currently in `Running` state.
struct ActiveRun {
    generation: u64,
    config: SessionConfig,
    cancel: oneshot::Sender<()>,
}

impl ActiveRun {
    /// Cancel the pending delay. An in-flight probe finishes on its own deadline.
    fn halt(self) {
        let _ = self.cancel.send(());
    }
}

struct Engine {
    probes: ProbeSet,
    events: mpsc::UnboundedSender<EngineEvent>,
    reports: mpsc::UnboundedSender<CycleReport>,
    active: Option<ActiveRun>,
    next_generation: u64,
}

impl Engine {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
        mut reports: mpsc::UnboundedReceiver<CycleReport>,
    ) {
        tracing::debug!("Engine started");

        loop {
            tokio::select! {
                // Commands first: a stop must be seen before any report queued behind it.
                biased;

                command = commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => {
                        if let Some(run) = self.active.take() {
                            run.halt();
                        }
                        break;
                    }
                    Some(command) => self.handle_command(command),
                },
                Some(report) = reports.recv() => self.handle_report(report),
            }
        }

        tracing::debug!("Engine stopped");
    }

    fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Start(config) => self.start(config),
            EngineCommand::Stop => self.stop(),
            EngineCommand::Shutdown => {}
        }
    }

    fn start(&mut self, config: SessionConfig) {
        if let Some(run) = self.active.take() {
            tracing::warn!(generation = run.generation, "Restarting active run");
            self.emit(EngineEvent::log(
                LogLevel::Warn,
                "Already running; restarting with new config.",
            ));
            run.halt();
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        self.emit(EngineEvent::log(
            LogLevel::Info,
            format!("Worker started: {} -> {}", config.mode, config.target),
        ));
        tracing::info!(
            generation,
            mode = %config.mode,
            probe_target = %config.target,
            interval_ms = config.interval_ms,
            timeout_ms = config.timeout_ms,
            "Run started"
        );

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let probe = self.probes.for_mode(config.mode);
        tokio::spawn(run_cycles(
            generation,
            config.clone(),
            probe,
            self.reports.clone(),
            cancel_rx,
        ));

        self.active = Some(ActiveRun {
            generation,
            config,
            cancel: cancel_tx,
        });
    }

    fn stop(&mut self) {
        match self.active.take() {
            Some(run) => {
                tracing::info!(generation = run.generation, "Run stopped");
                run.halt();
                self.emit(EngineEvent::log(LogLevel::Info, "Worker stop received."));
                self.emit(EngineEvent::Stopped);
            }
            None => {
                self.emit(EngineEvent::log(
                    LogLevel::Debug,
                    "Worker stop received while idle.",
                ));
            }
        }
    }

    fn handle_report(&mut self, report: CycleReport) {
        let Some(run) = self
            .active
            .as_ref()
            .filter(|run| run.generation == report.generation)
        else {
            tracing::debug!(generation = report.generation, "Dropping result of inactive run");
            return;
        };

        let event = match &report.outcome {
            CycleOutcome::Completed(result) => EngineEvent::result(run.config.mode, result),
            CycleOutcome::Fault(reason) => {
                tracing::error!(generation = run.generation, error = %reason, "Probe fault");
                EngineEvent::log(LogLevel::Error, format!("Error: {reason}"))
            }
        };
        self.emit(event);
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

// =============================================================================
// Cycle task
// =============================================================================

/// `true` once the run has been cancelled or its engine is gone.
fn is_cancelled(cancel: &mut oneshot::Receiver<()>) -> bool {
    !matches!(cancel.try_recv(), Err(oneshot::error::TryRecvError::Empty))
}

/// Probe immediately, then again `interval` after each completion.
async fn run_cycles(
    generation: u64,
    config: SessionConfig,
    probe: Arc<dyn Probe>,
    reports: mpsc::UnboundedSender<CycleReport>,
    mut cancel: oneshot::Receiver<()>,
) {
    let interval = config.interval();

    loop {
        if is_cancelled(&mut cancel) {
            break;
        }

        let outcome = run_cycle(&probe, &config).await;
        if reports.send(CycleReport { generation, outcome }).is_err() {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!(generation, "Cycle task finished");
}

/// Run one probe in its own task so a panic is contained.
async fn run_cycle(probe: &Arc<dyn Probe>, config: &SessionConfig) -> CycleOutcome {
    let probe = Arc::clone(probe);
    let target = config.target.clone();
    let (method, timeout) = (config.method, config.timeout());

    match tokio::spawn(async move { probe.probe(&target, method, timeout).await }).await {
        Ok(result) => CycleOutcome::Completed(result),
        Err(e) => CycleOutcome::Fault(e.to_string()),
    }
}
