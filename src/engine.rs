//! Probing Engine
//!
//! A cancellable scheduling loop that issues one probe at a time and talks
//! to its host only through ordered messages.
//!
//! # Architecture
//!
//! - [`EngineCommand`]: inbound `start` / `stop`
//! - [`EngineEvent`]: outbound `log` / `result` / `stopped`
//! - [`EngineHandle`]: command side returned by [`spawn`]
//!
//! # Example
//!
//! ```rust,no_run
//! use sonar::config::{ProbeMode, SessionConfig};
//! use sonar::engine;
//! use sonar::probe::{ProbeSet, SimulatedProbe};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let probes = ProbeSet::uniform(Arc::new(SimulatedProbe::default()));
//! let (handle, mut events) = engine::spawn(probes);
//! handle.start(SessionConfig::new("demo", ProbeMode::Simulate)).unwrap();
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

mod message;
mod scheduler;

pub use message::{EngineCommand, EngineEvent, EventPayload};
pub use scheduler::{EngineError, EngineEvents, EngineHandle, spawn};
