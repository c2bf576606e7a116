//! The log entry wire model.
//!
//! One entry is one JSON object on one line. The six required keys come first
//! in a fixed order (`ts`, `lvl`, `cid`, `aid`, `evt`, `msg`), followed by any
//! event-specific extension fields in insertion order.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hub_core::{AgentId, CorrelationId};

/// Extension fields of an entry, ordered as inserted.
pub type Fields = serde_json::Map<String, Value>;

/// Keys owned by [`LogEntry`] itself. Extension fields never override them.
pub const REQUIRED_KEYS: [&str; 6] = ["ts", "lvl", "cid", "aid", "evt", "msg"];

/// Severity of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostics such as tool hooks.
    Debug,
    /// Normal lifecycle and decision events.
    Info,
    /// Something needs attention.
    Warn,
    /// Something failed.
    Error,
    /// The session cannot continue.
    Fatal,
}

impl LogLevel {
    /// Wire name of the level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Whether the level is `warn` or worse.
    #[must_use]
    pub fn is_problem(self) -> bool {
        self >= Self::Warn
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// UTC timestamp, second precision, `Z` suffix.
    pub ts: String,
    /// Severity.
    pub lvl: LogLevel,
    /// Correlation id.
    pub cid: CorrelationId,
    /// Emitting agent.
    pub aid: AgentId,
    /// Event type, dotted (`decision.made`).
    pub evt: String,
    /// Short human-readable message.
    pub msg: String,
    /// Event-specific fields.
    #[serde(flatten)]
    pub extra: Fields,
}

impl LogEntry {
    /// Build an entry, truncating `msg` and dropping extension keys that
    /// collide with required ones.
    #[must_use]
    pub fn new(
        ts: DateTime<Utc>,
        lvl: LogLevel,
        cid: CorrelationId,
        aid: AgentId,
        evt: impl Into<String>,
        msg: &str,
        mut extra: Fields,
    ) -> Self {
        for key in REQUIRED_KEYS {
            let _ = extra.remove(key);
        }
        Self {
            ts: format_timestamp(ts),
            lvl,
            cid,
            aid,
            evt: evt.into(),
            msg: truncate_chars(msg, hub_core::constants::MESSAGE_MAX_CHARS),
            extra,
        }
    }

    /// Parsed timestamp, if `ts` is well-formed.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.ts)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// An extension field by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Serialize as one newline-terminated JSON line.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// ISO-8601 UTC at second precision (`2026-02-04T10:30:00Z`).
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Cap `s` at `max` characters; longer values keep `max - 3` characters and
/// gain a `...` suffix.
#[must_use]
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
