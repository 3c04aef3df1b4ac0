//! Core probe trait and result types.

use std::time::Duration;

use thiserror::Error;

use crate::config::{HttpMethod, ProbeMode};

/// Errors raised while constructing probes.
///
/// Probing itself never fails past the [`Probe`] boundary; every attempt
/// yields a [`ProbeResult`].
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Outcome of exactly one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Whether the target counted as reachable.
    pub ok: bool,
    /// Elapsed time of the attempt in whole milliseconds.
    pub rtt_ms: u64,
    /// Human-readable outcome (`OK`, `timeout`, transport error, ...).
    pub status_text: String,
}

impl ProbeResult {
    pub fn success(rtt_ms: u64, status_text: impl Into<String>) -> Self {
        Self {
            ok: true,
            rtt_ms,
            status_text: status_text.into(),
        }
    }

    pub fn failure(rtt_ms: u64, status_text: impl Into<String>) -> Self {
        Self {
            ok: false,
            rtt_ms,
            status_text: status_text.into(),
        }
    }

    /// Result line: `<MODE> <OK|FAIL> <rtt>ms[ - <statusText>]`.
    pub fn summary(&self, mode: ProbeMode) -> String {
        let verdict = if self.ok { "OK" } else { "FAIL" };
        if self.status_text.is_empty() {
            format!("{} {} {}ms", mode.label(), verdict, self.rtt_ms)
        } else {
            format!(
                "{} {} {}ms - {}",
                mode.label(),
                verdict,
                self.rtt_ms,
                self.status_text
            )
        }
    }
}

/// Round a duration to the nearest whole millisecond.
pub fn round_ms(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

/// A single reachability check.
///
/// Implementations capture every failure mode (refused connection, DNS
/// failure, timeout, simulated loss) as `ok: false` and report the time
/// spent up to success or failure. They hold no session state.
#[async_trait::async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Probe `target` once, giving up after `timeout`.
    async fn probe(&self, target: &str, method: HttpMethod, timeout: Duration) -> ProbeResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_status() {
        let result = ProbeResult::success(42, "OK");
        assert_eq!(result.summary(ProbeMode::Http), "HTTP OK 42ms - OK");

        let result = ProbeResult::failure(300, "timeout");
        assert_eq!(result.summary(ProbeMode::Http), "HTTP FAIL 300ms - timeout");
    }

    #[test]
    fn test_summary_without_status() {
        let result = ProbeResult::success(7, "");
        assert_eq!(result.summary(ProbeMode::Simulate), "SIMULATE OK 7ms");
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(Duration::from_micros(1_499)), 1);
        assert_eq!(round_ms(Duration::from_micros(1_500)), 2);
        assert_eq!(round_ms(Duration::ZERO), 0);
    }
}
