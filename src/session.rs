//! Session controller.
//!
//! Thin orchestrator between a host (HTTP API, CLI) and one engine. It
//! validates configuration, forwards `start`/`stop`, owns the
//! [`EngineState`], and pumps engine events into the shared [`LogBuffer`]
//! alongside its own lifecycle entries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, SessionConfig};
use crate::engine::{self, EngineError, EngineEvent, EngineEvents, EngineHandle};
use crate::log_buffer::{LogBuffer, LogLevel};
use crate::probe::ProbeSet;

/// Errors returned by [`Session`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The configuration was rejected; nothing was started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine could not be reached.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),

    /// The session has been disposed.
    #[error("session disposed")]
    Disposed,
}

/// Whether a session is probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EngineState {
    #[default]
    Idle,
    Running,
}

/// State shared between the controller and its event pump.
#[derive(Debug, Default)]
struct Shared {
    state: EngineState,
    config: Option<SessionConfig>,
    /// Identifies the current engine; bumped on every respawn.
    epoch: u64,
    disposed: bool,
}

struct EngineLink {
    handle: EngineHandle,
    pump: JoinHandle<()>,
}

/// One probing session with an explicit `new` / `start` / `stop` / `dispose`
/// lifecycle.
///
/// The engine is spawned lazily on the first `start` and respawned after a
/// transport fault. Must be used from within a Tokio runtime.
pub struct Session {
    probes: ProbeSet,
    logs: Arc<LogBuffer>,
    shared: Arc<Mutex<Shared>>,
    engine: Mutex<Option<EngineLink>>,
}

impl Session {
    pub fn new(probes: ProbeSet, logs: Arc<LogBuffer>) -> Self {
        Self {
            probes,
            logs,
            shared: Arc::new(Mutex::new(Shared::default())),
            engine: Mutex::new(None),
        }
    }

    /// Validate `config` and start probing, restarting if already running.
    ///
    /// # Errors
    /// - `SessionError::Config` if validation fails (no log entry, no engine event)
    /// - `SessionError::EngineUnavailable` if the engine rejected the command;
    ///   the session is left Idle
    /// - `SessionError::Disposed` after [`dispose`](Self::dispose)
    pub fn start(&self, config: SessionConfig) -> Result<(), SessionError> {
        let config = config.normalized();
        config.validate().inspect_err(|e| {
            tracing::warn!(error = %e, "Session start rejected");
        })?;

        let handle = self.engine_handle()?;
        self.logs.push(
            LogLevel::Info,
            format!(
                "Started {} to {} (interval={}ms, timeout={}ms)",
                config.mode, config.target, config.interval_ms, config.timeout_ms
            ),
        );

        // Recorded before the send; a fault seen by the pump resets it to Idle.
        {
            let mut shared = lock(&self.shared);
            shared.state = EngineState::Running;
            shared.config = Some(config.clone());
        }

        if let Err(e) = handle.start(config.clone()) {
            self.transport_fault(&e.to_string());
            return Err(e.into());
        }

        tracing::info!(
            mode = %config.mode,
            probe_target = %config.target,
            "Session started"
        );
        Ok(())
    }

    /// Request the engine to stop. Safe to call when idle or after the
    /// engine has failed.
    ///
    /// # Errors
    /// Returns `SessionError::Disposed` after [`dispose`](Self::dispose).
    pub fn stop(&self) -> Result<(), SessionError> {
        if lock(&self.shared).disposed {
            return Err(SessionError::Disposed);
        }

        self.logs.push(LogLevel::Info, "Stop requested by user.");
        lock(&self.shared).state = EngineState::Idle;

        // A closed engine has nothing running; the fault was already logged.
        let handle = lock(&self.engine)
            .as_ref()
            .map(|link| link.handle.clone())
            .filter(|handle| !handle.is_closed());
        if let Some(handle) = handle
            && let Err(e) = handle.stop()
        {
            tracing::debug!(error = %e, "Engine gone before stop; nothing to stop");
        }

        tracing::info!("Session stop requested");
        Ok(())
    }

    /// Shut the engine down and wait until its remaining events are logged.
    ///
    /// Further `start`/`stop` calls return `SessionError::Disposed`.
    pub async fn dispose(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.disposed {
                return;
            }
            shared.disposed = true;
            shared.state = EngineState::Idle;
        }

        let link = lock(&self.engine).take();
        if let Some(link) = link {
            let _ = link.handle.shutdown();
            if let Err(e) = link.pump.await {
                tracing::warn!(error = %e, "Event pump ended abnormally");
            }
        }
        tracing::info!("Session disposed");
    }

    pub fn state(&self) -> EngineState {
        lock(&self.shared).state
    }

    /// Configuration of the most recent accepted start.
    pub fn config(&self) -> Option<SessionConfig> {
        lock(&self.shared).config.clone()
    }

    pub fn logs(&self) -> &Arc<LogBuffer> {
        &self.logs
    }

    // --- Private helpers ---

    /// Current engine, spawning a fresh one if none is alive.
    fn engine_handle(&self) -> Result<EngineHandle, SessionError> {
        let mut engine = lock(&self.engine);
        let epoch = {
            let mut shared = lock(&self.shared);
            if shared.disposed {
                return Err(SessionError::Disposed);
            }
            if let Some(link) = engine.as_ref()
                && !link.handle.is_closed()
            {
                return Ok(link.handle.clone());
            }
            shared.epoch += 1;
            shared.epoch
        };

        let (handle, events) = engine::spawn(self.probes.clone());
        let pump = tokio::spawn(pump_events(
            events,
            Arc::clone(&self.logs),
            Arc::clone(&self.shared),
            epoch,
        ));
        tracing::debug!(epoch, "Engine spawned");

        *engine = Some(EngineLink {
            handle: handle.clone(),
            pump,
        });
        Ok(handle)
    }

    fn transport_fault(&self, reason: &str) {
        tracing::error!(error = %reason, "Engine transport fault");
        self.logs.push(LogLevel::Error, format!("Worker error: {reason}"));
        lock(&self.shared).state = EngineState::Idle;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append engine events to the log in arrival order.
///
/// A closed stream that was not caused by `dispose` is a transport fault.
async fn pump_events(
    mut events: EngineEvents,
    logs: Arc<LogBuffer>,
    shared: Arc<Mutex<Shared>>,
    epoch: u64,
) {
    while let Some(event) = events.recv().await {
        match event.to_entry() {
            Some(entry) => logs.append(entry),
            None => logs.push(LogLevel::Info, "Ping session stopped."),
        }
        if event == EngineEvent::Stopped {
            tracing::debug!(epoch, "Engine reported stopped");
        }
    }

    let mut shared = lock(&shared);
    if shared.disposed || shared.epoch != epoch {
        return;
    }
    shared.state = EngineState::Idle;
    drop(shared);

    tracing::error!(epoch, "Engine event stream closed unexpectedly");
    logs.push(
        LogLevel::Error,
        "Worker error: engine task terminated unexpectedly",
    );
}
