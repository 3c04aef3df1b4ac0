//! Messages exchanged between the engine and its host.
//!
//! Both directions serialize as `{"type": ..., "payload": ...}` so an
//! out-of-process host can speak the same protocol.

use serde::{Deserialize, Serialize};

use crate::config::{ProbeMode, SessionConfig};
use crate::log_buffer::{LogEntry, LogLevel};
use crate::probe::ProbeResult;

/// Host to engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum EngineCommand {
    /// Begin probing, restarting if a run is active.
    Start(SessionConfig),
    /// Stop probing.
    Stop,
    /// Terminate the engine task.
    #[serde(skip)]
    Shutdown,
}

/// Level and text carried by `log` and `result` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub level: LogLevel,
    pub message: String,
}

/// Engine to host, delivered in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum EngineEvent {
    /// Lifecycle or fault message.
    Log(EventPayload),
    /// Outcome of one probe cycle.
    Result(EventPayload),
    /// The active run has ended.
    Stopped,
}

impl EngineEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log(EventPayload {
            level,
            message: message.into(),
        })
    }

    /// `info` for reachable results, `error` otherwise.
    pub fn result(mode: ProbeMode, result: &ProbeResult) -> Self {
        let level = if result.ok {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        Self::Result(EventPayload {
            level,
            message: result.summary(mode),
        })
    }

    /// Log entry recorded for this event, stamped now.
    ///
    /// `Stopped` carries no text of its own and yields `None`.
    pub fn to_entry(&self) -> Option<LogEntry> {
        match self {
            Self::Log(payload) | Self::Result(payload) => {
                Some(LogEntry::new(payload.level, payload.message.clone()))
            }
            Self::Stopped => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_command_wire_format() {
        let raw = json!({
            "type": "start",
            "payload": {
                "target": "https://example.com",
                "mode": "http",
                "method": "HEAD",
                "intervalMs": 1000,
                "timeoutMs": 3000
            }
        });
        let cmd: EngineCommand = serde_json::from_value(raw).unwrap();
        match cmd {
            EngineCommand::Start(config) => {
                assert_eq!(config.target, "https://example.com");
                assert_eq!(config.timeout_ms, 3000);
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn test_stop_command_wire_format() {
        let cmd: EngineCommand = serde_json::from_value(json!({ "type": "stop" })).unwrap();
        assert_eq!(cmd, EngineCommand::Stop);
    }

    #[test]
    fn test_shutdown_not_accepted_from_wire() {
        let cmd = serde_json::from_value::<EngineCommand>(json!({ "type": "shutdown" }));
        assert!(cmd.is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let event = EngineEvent::result(ProbeMode::Http, &ProbeResult::failure(301, "timeout"));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "result",
                "payload": { "level": "error", "message": "HTTP FAIL 301ms - timeout" }
            })
        );

        let stopped = serde_json::to_value(EngineEvent::Stopped).unwrap();
        assert_eq!(stopped, json!({ "type": "stopped" }));
    }

    #[test]
    fn test_to_entry() {
        let event = EngineEvent::log(LogLevel::Warn, "Already running; restarting with new config.");
        let entry = event.to_entry().unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert!(EngineEvent::Stopped.to_entry().is_none());
    }
}
