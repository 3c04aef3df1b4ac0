//! Per-run session configuration.
//!
//! A [`SessionConfig`] is immutable for the lifetime of one run. Restarting
//! a session replaces it wholesale.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::validation::ConfigError;

/// Minimum delay between the end of one probe and the start of the next.
pub const MIN_INTERVAL_MS: u64 = 200;

/// Minimum per-probe timeout.
pub const MIN_TIMEOUT_MS: u64 = 300;

/// How a target is probed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProbeMode {
    /// Real outbound HTTP request.
    #[default]
    Http,
    /// Randomized latency and loss, no network access.
    Simulate,
}

impl ProbeMode {
    /// Upper-case label used in result messages (`HTTP`, `SIMULATE`).
    pub fn label(&self) -> String {
        self.as_ref().to_uppercase()
    }
}

/// HTTP method for network probes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    #[default]
    Head,
    Get,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Get => reqwest::Method::GET,
        }
    }
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_timeout_ms() -> u64 {
    3_000
}

/// Configuration for one probing session.
///
/// Field names follow the host message contract (`intervalMs`, `timeoutMs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// URL for `http` mode, free text for `simulate` mode.
    pub target: String,
    /// Probe strategy selector.
    #[serde(default)]
    pub mode: ProbeMode,
    /// HTTP method; ignored in `simulate` mode.
    #[serde(default)]
    pub method: HttpMethod,
    /// Delay after each completed probe, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Per-probe deadline, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SessionConfig {
    /// Create a configuration with default method, interval and timeout.
    pub fn new(target: impl Into<String>, mode: ProbeMode) -> Self {
        Self {
            target: target.into(),
            mode,
            method: HttpMethod::default(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the inter-probe delay in milliseconds.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the per-probe timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Copy of this configuration with surrounding whitespace removed from the target.
    pub fn normalized(&self) -> Self {
        Self {
            target: self.target.trim().to_string(),
            ..self.clone()
        }
    }

    /// Check the session invariants.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when the target is empty, an
    /// `http` target is not an absolute URL, or interval/timeout are below
    /// their minimums.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let target = self.target.trim();
        if target.is_empty() {
            return Err(ConfigError::invalid("target must not be empty"));
        }

        if self.mode == ProbeMode::Http {
            url::Url::parse(target).map_err(|e| {
                ConfigError::invalid(format!(
                    "http target must be an absolute URL: '{}' ({})",
                    target, e
                ))
            })?;
        }

        if self.interval_ms < MIN_INTERVAL_MS {
            return Err(ConfigError::invalid(format!(
                "intervalMs must be >= {}, got {}",
                MIN_INTERVAL_MS, self.interval_ms
            )));
        }

        if self.timeout_ms < MIN_TIMEOUT_MS {
            return Err(ConfigError::invalid(format!(
                "timeoutMs must be >= {}, got {}",
                MIN_TIMEOUT_MS, self.timeout_ms
            )));
        }

        Ok(())
    }
}
