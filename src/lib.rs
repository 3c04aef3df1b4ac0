//! Sonar - Reachability and Latency Monitor
//!
//! This crate provides the core of the Sonar probing tool. It can be used as
//! a library, or run as a standalone binary with the `sonar` executable.
//!
//! # Architecture
//!
//! - **Probe**: single-shot HTTP and simulated reachability checks
//! - **Engine**: cancellable fixed-delay scheduling loop behind a message channel
//! - **Log buffer**: capped, exportable history of lifecycle and result entries
//! - **Session**: controller tying configuration, engine and log together
//! - **Server**: JSON API over a session
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sonar::{LogBuffer, ProbeMode, ProbeSet, Session, SessionConfig, SimulatedProbe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let probes = ProbeSet::uniform(Arc::new(SimulatedProbe::default()));
//!     let session = Session::new(probes, Arc::new(LogBuffer::default()));
//!
//!     session.start(SessionConfig::new("demo", ProbeMode::Simulate))?;
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     session.stop()?;
//!     session.dispose().await;
//!
//!     println!("{}", session.logs().export());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod log_buffer;
pub mod probe;
pub mod server;
pub mod session;

pub use config::{AppConfig, ConfigError, HttpMethod, ProbeMode, SessionConfig};
pub use engine::{EngineCommand, EngineEvent, EngineHandle};
pub use log_buffer::{LogBuffer, LogEntry, LogLevel};
pub use probe::{HttpProbe, Probe, ProbeResult, ProbeSet, SimulatedProbe};
pub use session::{EngineState, Session, SessionError};
