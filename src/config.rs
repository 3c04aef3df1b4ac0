//! Configuration module.
//!
//! - [`SessionConfig`]: one probing run (target, mode, method, interval, timeout)
//! - [`AppConfig`]: YAML application settings (server, log buffer, probes)
//! - [`ConfigError`]: read, parse and validation failures

mod app;
mod session;
mod validation;

pub use app::{
    AppConfig, DEFAULT_LOSS_RATE, DEFAULT_MAX_LATENCY, DEFAULT_MIN_LATENCY, HttpProbeConfig,
    LogConfig, ServerConfig, SimulationConfig,
};
pub use session::{HttpMethod, MIN_INTERVAL_MS, MIN_TIMEOUT_MS, ProbeMode, SessionConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration};
