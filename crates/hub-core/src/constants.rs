//! Package-level constants and registry layout names.

/// Current version of the agent hub (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "agent-hub";

/// Directory that marks a registry root (global under `$HOME`, or per project).
pub const MARKER_DIR: &str = ".claude";

/// Directory under a registry root holding the date-partitioned logs.
pub const LOGS_DIR: &str = "logs";

/// File extension of session log files.
pub const LOG_EXTENSION: &str = "jsonl";

/// Stem suffix of compacted session files.
pub const COMPACTED_SUFFIX: &str = "_compacted";

/// Agent identity used when the caller does not provide one.
pub const DEFAULT_AGENT_ID: &str = "orch:default";

/// Maximum stored length of an entry's `msg`, in characters.
pub const MESSAGE_MAX_CHARS: usize = 100;

/// Maximum stored length of tool input/result payloads, in characters.
pub const TOOL_PAYLOAD_MAX_CHARS: usize = 500;
