//! Application configuration structures.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::log_buffer::{DEFAULT_CAPACITY, LogLevel};
use crate::probe::ReachabilityPolicy;

use super::session::SessionConfig;
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default lower bound of simulated latency.
pub const DEFAULT_MIN_LATENCY: Duration = Duration::from_millis(20);

/// Default upper bound of simulated latency.
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(200);

/// Default probability of a simulated loss.
pub const DEFAULT_LOSS_RATE: f64 = 0.05;

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_level() -> String {
    "info".to_string()
}

fn default_min_latency() -> Duration {
    DEFAULT_MIN_LATENCY
}

fn default_max_latency() -> Duration {
    DEFAULT_MAX_LATENCY
}

fn default_loss_rate() -> f64 {
    DEFAULT_LOSS_RATE
}

fn default_user_agent() -> String {
    concat!("sonar/", env!("CARGO_PKG_VERSION")).to_string()
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// =============================================================================
// Log Configuration
// =============================================================================

/// Log buffer and diagnostics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Maximum retained log entries (default: 5000).
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Directory that export files are written to (default: ".").
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Diagnostic verbosity when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            export_dir: default_export_dir(),
            level: default_level(),
        }
    }
}

// =============================================================================
// Probe Configuration
// =============================================================================

/// Parameters of the synthetic probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Lower bound of the simulated round trip (default: 20ms).
    #[serde(default = "default_min_latency", with = "humantime_serde")]
    pub min_latency: Duration,

    /// Upper bound of the simulated round trip (default: 200ms).
    #[serde(default = "default_max_latency", with = "humantime_serde")]
    pub max_latency: Duration,

    /// Probability in `[0, 1]` that a probe is reported lost (default: 0.05).
    #[serde(default = "default_loss_rate")]
    pub loss_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency: DEFAULT_MIN_LATENCY,
            max_latency: DEFAULT_MAX_LATENCY,
            loss_rate: DEFAULT_LOSS_RATE,
        }
    }
}

/// Parameters of the network probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProbeConfig {
    /// Which completed exchanges count as reachable (default: any_response).
    #[serde(default)]
    pub policy: ReachabilityPolicy,

    /// User-Agent header sent with every probe.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            policy: ReachabilityPolicy::default(),
            user_agent: default_user_agent(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log buffer configuration.
    #[serde(default)]
    pub log: LogConfig,

    /// Synthetic probe parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Network probe parameters.
    #[serde(default)]
    pub http: HttpProbeConfig,

    /// Session started automatically on launch.
    #[serde(default)]
    pub session: Option<SessionConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` references in the session target are expanded.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        if let Some(session) = config.session.as_mut() {
            session.target = expand_env_vars(&session.target);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::invalid(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(ConfigError::invalid("server port must be non-zero"));
        }

        if self.log.capacity == 0 {
            return Err(ConfigError::invalid("log capacity must be positive"));
        }

        LogLevel::from_str(&self.log.level).map_err(|_| {
            ConfigError::invalid(format!(
                "log level must be one of debug|info|warn|error, got '{}'",
                self.log.level
            ))
        })?;

        if self.simulation.min_latency > self.simulation.max_latency {
            return Err(ConfigError::invalid(format!(
                "simulation min_latency ({:?}) exceeds max_latency ({:?})",
                self.simulation.min_latency, self.simulation.max_latency
            )));
        }

        if !(0.0..=1.0).contains(&self.simulation.loss_rate) {
            return Err(ConfigError::invalid(format!(
                "simulation loss_rate must be within [0, 1], got {}",
                self.simulation.loss_rate
            )));
        }

        if let Some(session) = &self.session {
            session.validate()?;
        }

        Ok(())
    }
}
