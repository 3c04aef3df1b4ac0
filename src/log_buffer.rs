//! Bounded, ordered buffer of session log entries.
//!
//! The buffer is the event sink of the probing engine. It retains the most
//! recent entries (oldest evicted first), renders them to a byte-stable text
//! export, and fans appended entries out to live subscribers.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::sync::broadcast;

/// Default number of retained entries.
pub const DEFAULT_CAPACITY: usize = 5_000;

/// Backlog of the live subscription channel.
const SUBSCRIBER_BACKLOG: usize = 1_024;

/// Severity of a log entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Capture time (when the entry reached the sink).
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), level, message)
    }

    /// Create an entry with an explicit timestamp.
    pub fn at(ts: DateTime<Utc>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            ts,
            level,
            message: message.into(),
        }
    }
}

/// Export line format: `[timestamp] [LEVEL] message`.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.as_ref().to_uppercase(),
            self.message
        )
    }
}

/// File name for an export taken at `now`: `ping-logs-<iso8601>.txt` with
/// `:` and `.` replaced by `-`.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("ping-logs-{stamp}.txt")
}

/// Capacity-bounded FIFO of log entries.
///
/// Appends are serialized by an internal mutex, so the engine side and any
/// reader thread may share one buffer behind an `Arc`.
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    live: broadcast::Sender<LogEntry>,
}

impl LogBuffer {
    /// Create a buffer retaining at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(SUBSCRIBER_BACKLOG);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
            live,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn append(&self, entry: LogEntry) {
        {
            let mut entries = self.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }
        // No subscribers is not an error.
        let _ = self.live.send(entry);
    }

    /// Append a new entry stamped with the current time.
    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        self.append(LogEntry::new(level, message));
    }

    /// Discard all retained entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// The newest `limit` entries, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Render all retained entries, one per line, newline-joined.
    pub fn export(&self) -> String {
        self.lock()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write [`export`](Self::export) to `dir` under [`export_file_name`].
    ///
    /// # Errors
    /// Returns the underlying I/O error if the directory or file cannot be written.
    pub fn write_export(&self, dir: impl AsRef<Path>, now: DateTime<Utc>) -> std::io::Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(now));
        std::fs::write(&path, self.export())?;
        tracing::info!(path = %path.display(), entries = self.len(), "Logs exported");
        Ok(path)
    }

    /// Receive every entry appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn fixed_ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_log_level_round_trip_names() {
        assert_eq!(LogLevel::from_str("WARN").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Error.as_ref(), "error");
        assert!(LogLevel::from_str("fatal").is_err());
        assert!(LogLevel::Debug < LogLevel::Error);
    }

    #[test]
    fn test_entry_display_format() {
        let entry = LogEntry::at(fixed_ts(123), LogLevel::Warn, "slow response");
        assert_eq!(
            entry.to_string(),
            "[2023-11-14T22:13:20.123Z] [WARN] slow response"
        );
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let buffer = LogBuffer::new(3);
        for i in 0..4 {
            buffer.append(LogEntry::at(fixed_ts(i), LogLevel::Info, format!("entry {i}")));
        }

        let messages: Vec<_> = buffer.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 1", "entry 2", "entry 3"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_default_capacity_overflow_by_one() {
        let buffer = LogBuffer::default();
        for i in 0..=DEFAULT_CAPACITY {
            buffer.push(LogLevel::Debug, i.to_string());
        }
        let entries = buffer.entries();
        assert_eq!(entries.len(), DEFAULT_CAPACITY);
        assert_eq!(entries.first().unwrap().message, "1");
        assert_eq!(entries.last().unwrap().message, DEFAULT_CAPACITY.to_string());
    }

    #[test]
    fn test_export_one_line_per_entry() {
        let buffer = LogBuffer::new(10);
        buffer.append(LogEntry::at(fixed_ts(0), LogLevel::Info, "Worker started: http -> https://example.com"));
        buffer.append(LogEntry::at(fixed_ts(5), LogLevel::Error, "HTTP FAIL 300ms - timeout"));

        let export = buffer.export();
        assert_eq!(
            export,
            "[2023-11-14T22:13:20.000Z] [INFO] Worker started: http -> https://example.com\n\
             [2023-11-14T22:13:20.005Z] [ERROR] HTTP FAIL 300ms - timeout"
        );

        let pattern = regex::Regex::new(r"^\[[^\]]+\] \[(DEBUG|INFO|WARN|ERROR)\] .*$").unwrap();
        let lines: Vec<_> = export.split('\n').collect();
        assert_eq!(lines.len(), buffer.len());
        assert!(lines.iter().all(|line| pattern.is_match(line)));
    }

    #[test]
    fn test_export_is_stable() {
        let buffer = LogBuffer::new(10);
        buffer.append(LogEntry::at(fixed_ts(1), LogLevel::Debug, "a"));
        assert_eq!(buffer.export(), buffer.export());
    }

    #[test]
    fn test_export_empty() {
        assert_eq!(LogBuffer::new(4).export(), "");
    }

    #[test]
    fn test_clear_discards_entries() {
        let buffer = LogBuffer::new(4);
        buffer.push(LogLevel::Info, "one");
        buffer.clear();
        assert!(buffer.is_empty());
        buffer.push(LogLevel::Info, "two");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_tail_returns_newest() {
        let buffer = LogBuffer::new(10);
        for i in 0..5 {
            buffer.push(LogLevel::Info, i.to_string());
        }
        let tail: Vec<_> = buffer.tail(2).into_iter().map(|e| e.message).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert_eq!(buffer.tail(50).len(), 5);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(
            export_file_name(fixed_ts(42)),
            "ping-logs-2023-11-14T22-13-20-042Z.txt"
        );
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = LogBuffer::new(4);
        buffer.append(LogEntry::at(fixed_ts(0), LogLevel::Info, "hello"));

        let path = buffer.write_export(dir.path().join("exports"), fixed_ts(0)).unwrap();
        assert!(path.ends_with("ping-logs-2023-11-14T22-13-20-000Z.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), buffer.export());
    }

    #[tokio::test]
    async fn test_subscribe_receives_appends() {
        let buffer = LogBuffer::new(4);
        let mut rx = buffer.subscribe();
        buffer.push(LogLevel::Warn, "live");
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.message, "live");
    }
}
