//! HTTP reachability probe.
//!
//! Issues one request per attempt and measures the time until the response
//! head arrives. The request is dropped, and with it the connection attempt,
//! once the deadline passes.

use std::time::{Duration, Instant};

use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::config::{HttpMethod, HttpProbeConfig};
use crate::probe::traits::{Probe, ProbeError, ProbeResult, round_ms};

/// Status text reported when the deadline elapses.
pub const TIMEOUT_STATUS: &str = "timeout";

/// Which completed exchanges count as reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityPolicy {
    /// Any response without a transport error is reachable.
    #[default]
    AnyResponse,
    /// Only 2xx responses are reachable.
    SuccessStatus,
}

impl ReachabilityPolicy {
    pub fn is_reachable(&self, status: StatusCode) -> bool {
        match self {
            Self::AnyResponse => true,
            Self::SuccessStatus => status.is_success(),
        }
    }
}

/// Network probe backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    policy: ReachabilityPolicy,
}

impl HttpProbe {
    /// Build a probe from configuration.
    ///
    /// # Errors
    /// Returns `ProbeError::Client` if the HTTP client cannot be built.
    pub fn new(config: &HttpProbeConfig) -> Result<Self, ProbeError> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self {
            client,
            policy: config.policy,
        })
    }

    pub fn policy(&self) -> ReachabilityPolicy {
        self.policy
    }
}

/// Render an error with its source chain, e.g.
/// `error sending request for url (...): tcp connect error: Connection refused`.
fn describe_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_owned)
        .unwrap_or_else(|| status.as_str().to_owned())
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &str, method: HttpMethod, deadline: Duration) -> ProbeResult {
        let request = self
            .client
            .request(method.into(), target)
            .header(CACHE_CONTROL, "no-store");

        let start = Instant::now();
        let result = timeout(deadline, request.send()).await;
        let rtt_ms = round_ms(start.elapsed());

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                let ok = self.policy.is_reachable(status);
                if ok {
                    tracing::debug!(
                        target_url = %target,
                        rtt_ms,
                        status = status.as_u16(),
                        "HTTP probe successful"
                    );
                } else {
                    tracing::warn!(
                        target_url = %target,
                        rtt_ms,
                        status = status.as_u16(),
                        "HTTP probe rejected by status policy"
                    );
                }
                ProbeResult {
                    ok,
                    rtt_ms,
                    status_text: status_text(status),
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(target_url = %target, rtt_ms, error = %e, "HTTP probe failed");
                ProbeResult::failure(rtt_ms, describe_error(&e))
            }
            Err(_) => {
                tracing::warn!(
                    target_url = %target,
                    timeout_ms = deadline.as_millis(),
                    "HTTP probe timed out"
                );
                ProbeResult::failure(rtt_ms, TIMEOUT_STATUS)
            }
        }
    }
}
