//! Settings type definitions.
//!
//! Field names stay snake_case so that `HUB_SECTION__FIELD` environment
//! variables map onto them without renaming. Every section implements
//! [`Default`] with production values and is `#[serde(default)]`, so a partial
//! JSON file only overrides what it names.

use serde::{Deserialize, Serialize};

use hub_core::constants::{DEFAULT_AGENT_ID, LOGS_DIR, MARKER_DIR};

/// Root settings type for the agent hub.
///
/// # JSON Format
///
/// ```json
/// {
///   "query": { "backend": "native", "timeout_ms": 5000 },
///   "retention": { "retention_days": 14 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Registry layout and logger defaults.
    pub registry: RegistrySettings,
    /// Query engine settings.
    pub query: QuerySettings,
    /// Retention and compaction ceilings.
    pub retention: RetentionSettings,
    /// Diagnostic logging for the binaries.
    pub logging: LoggingSettings,
}

/// Registry layout and logger defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Marker directory name that identifies a registry root.
    pub marker_dir: String,
    /// Logs directory name beneath a registry root.
    pub logs_dir: String,
    /// Agent identity used when a logger is built without one.
    pub default_agent: String,
    /// Run a quiet retention prune when a logger is constructed.
    pub auto_cleanup: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            marker_dir: MARKER_DIR.to_string(),
            logs_dir: LOGS_DIR.to_string(),
            default_agent: DEFAULT_AGENT_ID.to_string(),
            auto_cleanup: true,
        }
    }
}

/// Which filter evaluator the query engine uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterBackend {
    /// Shell out to the `jq` binary.
    #[default]
    Jq,
    /// Built-in predicate subset, no external dependency.
    Native,
}

/// Query engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Filter evaluator.
    pub backend: FilterBackend,
    /// Program name or path of the jq binary.
    pub jq_binary: String,
    /// Upper bound on a single external filter call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            backend: FilterBackend::Jq,
            jq_binary: "jq".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Retention and compaction ceilings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Delete date partitions older than this many days.
    pub retention_days: u32,
    /// Compact date partitions older than this many days.
    pub compact_after_days: u32,
    /// Total size ceiling for all log files, in megabytes.
    pub max_size_mb: f64,
    /// Ceiling on the number of log files.
    pub max_files: usize,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            retention_days: 7,
            compact_after_days: 3,
            max_size_mb: 50.0,
            max_files: 100,
        }
    }
}

impl RetentionSettings {
    /// Size ceiling in bytes.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0) as u64
    }
}

/// Diagnostic logging for the binaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
