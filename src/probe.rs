//! Probe Layer
//!
//! Single-shot reachability checks. Each strategy implements the one-method
//! [`Probe`] trait and is selected per session by [`ProbeMode`].
//!
//! - [`HttpProbe`]: real request with a deadline
//! - [`SimulatedProbe`]: randomized latency and loss, no network access
//! - [`ProbeSet`]: mode to strategy mapping handed to the engine

pub mod http;
pub mod simulate;
mod traits;

use std::sync::Arc;

pub use http::{HttpProbe, ReachabilityPolicy};
pub use simulate::SimulatedProbe;
pub use traits::{Probe, ProbeError, ProbeResult, round_ms};

use crate::config::{AppConfig, ProbeMode};

/// Strategies available to a session, keyed by [`ProbeMode`].
#[derive(Clone)]
pub struct ProbeSet {
    http: Arc<dyn Probe>,
    simulate: Arc<dyn Probe>,
}

impl ProbeSet {
    pub fn new(http: Arc<dyn Probe>, simulate: Arc<dyn Probe>) -> Self {
        Self { http, simulate }
    }

    /// Build the network and synthetic probes from application configuration.
    ///
    /// # Errors
    /// Returns `ProbeError::Client` if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProbeError> {
        Ok(Self::new(
            Arc::new(HttpProbe::new(&config.http)?),
            Arc::new(SimulatedProbe::from_config(&config.simulation)),
        ))
    }

    /// Use one strategy for every mode.
    pub fn uniform(probe: Arc<dyn Probe>) -> Self {
        Self::new(Arc::clone(&probe), probe)
    }

    pub fn for_mode(&self, mode: ProbeMode) -> Arc<dyn Probe> {
        match mode {
            ProbeMode::Http => Arc::clone(&self.http),
            ProbeMode::Simulate => Arc::clone(&self.simulate),
        }
    }
}

impl std::fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSet").finish_non_exhaustive()
    }
}
