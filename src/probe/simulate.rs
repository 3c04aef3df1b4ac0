//! Synthetic probe.
//!
//! Emulates a round trip by sleeping for a random delay and reporting loss
//! with a fixed probability. Performs no network access.

use std::time::Duration;

use rand::Rng;

use crate::config::{HttpMethod, SimulationConfig};
use crate::probe::traits::{Probe, ProbeResult};

/// Status text of a simulated loss.
pub const LOSS_STATUS: &str = "simulated timeout";

/// Status text of a simulated success.
pub const OK_STATUS: &str = "simulated OK";

/// Randomized latency and loss generator.
#[derive(Debug, Clone)]
pub struct SimulatedProbe {
    min_ms: u64,
    max_ms: u64,
    loss_rate: f64,
}

impl SimulatedProbe {
    /// Create a probe drawing delays from `[min, max]`.
    ///
    /// `max` below `min` collapses to `min`; `loss_rate` is clamped to `[0, 1]`.
    pub fn new(min: Duration, max: Duration, loss_rate: f64) -> Self {
        let min_ms = min.as_millis() as u64;
        let max_ms = (max.as_millis() as u64).max(min_ms);
        let loss_rate = if loss_rate.is_nan() {
            0.0
        } else {
            loss_rate.clamp(0.0, 1.0)
        };
        Self {
            min_ms,
            max_ms,
            loss_rate,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.min_latency, config.max_latency, config.loss_rate)
    }

    /// Draw one simulated delay (ms) and loss decision.
    pub fn draw(&self) -> (u64, bool) {
        let mut rng = rand::rng();
        let delay_ms = rng.random_range(self.min_ms..=self.max_ms);
        let lost = rng.random::<f64>() < self.loss_rate;
        (delay_ms, lost)
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

#[async_trait::async_trait]
impl Probe for SimulatedProbe {
    async fn probe(&self, target: &str, _method: HttpMethod, _timeout: Duration) -> ProbeResult {
        let (delay_ms, lost) = self.draw();
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        tracing::debug!(target_name = %target, delay_ms, lost, "Simulated probe completed");
        if lost {
            ProbeResult::failure(delay_ms, LOSS_STATUS)
        } else {
            ProbeResult::success(delay_ms, OK_STATUS)
        }
    }
}
