//! Per-run migration log.
//!
//! Each run owns one [`MigrationLog`]; nothing is shared between runs. Every
//! entry is also emitted through `tracing` at the matching level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// What an entry records. Row-level kinds follow the error taxonomy of the
/// loader; the severity is fixed per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Run lifecycle messages (start, table done, finish).
    Progress,
    /// A row was written.
    Inserted,
    /// A statement in the dump had to be skipped.
    ParseMalformed,
    /// A mapped legacy table is not present in the dump.
    TableMissing,
    /// A raw row could not be mapped.
    MappingInvalid,
    /// The row already exists under its unique key.
    PersistConflict,
    /// The store rejected the row.
    PersistFailure,
}

impl EntryKind {
    pub fn severity(self) -> Severity {
        match self {
            EntryKind::Progress | EntryKind::Inserted | EntryKind::PersistConflict => {
                Severity::Info
            }
            EntryKind::ParseMalformed | EntryKind::TableMissing => Severity::Warning,
            EntryKind::MappingInvalid | EntryKind::PersistFailure => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub kind: EntryKind,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.severity,
            self.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
            self.message
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationLog {
    entries: Vec<LogEntry>,
}

impl MigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry with the severity fixed by `kind`.
    pub fn record(&mut self, kind: EntryKind, message: impl Into<String>) {
        let message = message.into();
        let severity = kind.severity();
        match severity {
            Severity::Info if kind == EntryKind::Progress => tracing::info!("{}", message),
            Severity::Info => tracing::debug!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            severity,
            kind,
            message,
        });
    }

    pub fn progress(&mut self, message: impl Into<String>) {
        self.record(EntryKind::Progress, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    pub fn count_kind(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the log, keeping the entries in record order.
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_kind() {
        let mut log = MigrationLog::new();
        log.progress("starting");
        log.record(EntryKind::PersistConflict, "dup");
        log.record(EntryKind::ParseMalformed, "bad insert");
        log.record(EntryKind::MappingInvalid, "short row");

        assert_eq!(log.count(Severity::Info), 2);
        assert_eq!(log.count(Severity::Warning), 1);
        assert_eq!(log.count(Severity::Error), 1);
        assert_eq!(log.count_kind(EntryKind::PersistConflict), 1);
    }

    #[test]
    fn test_entries_keep_order() {
        let mut log = MigrationLog::new();
        log.progress("one");
        log.progress("two");
        let messages: Vec<_> = log.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two"]);
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);
    }

    #[test]
    fn test_entry_serializes_lowercase_severity() {
        let mut log = MigrationLog::new();
        log.record(EntryKind::PersistFailure, "boom");
        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["kind"], "persist_failure");
    }
}
