//! Registry error types.
//!
//! Three classes of failure surface to callers:
//!
//! - **Configuration**: [`RegistryError::NoProjectContext`] and
//!   [`FilterError::EvaluatorMissing`] name the missing piece and the remedy.
//! - **I/O**: [`RegistryError::Io`] and [`RegistryError::Emit`] carry the
//!   operation and path (and, for writes, the event type).
//! - **Filter**: evaluation failures of a single expression or file.
//!
//! Partial data (a corrupt line) is *not* an error: the query engine reports
//! it as a [`crate::query::Diagnostic`] and keeps going.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Filesystem operation failed outside the emit path.
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        /// What was being attempted.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Appending an event to its log file failed.
    #[error("failed to append '{event}' to {path}: {source}")]
    Emit {
        /// Event type being written.
        event: String,
        /// Target log file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An entry could not be serialized to a JSON line.
    #[error("failed to serialize '{event}' entry: {source}")]
    Serialize {
        /// Event type being written.
        event: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A project-scoped registry was required but none encloses `cwd`.
    #[error(
        "not in a project context: no registry marker above {cwd}; run `init-project` or use the global registry"
    )]
    NoProjectContext {
        /// Directory the search started from.
        cwd: PathBuf,
    },

    /// Filter evaluation failed.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl RegistryError {
    /// Build an [`RegistryError::Io`].
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Emit { .. } => "emit",
            Self::Serialize { .. } => "serialize",
            Self::NoProjectContext { .. } => "no_project_context",
            Self::Filter(inner) => inner.error_kind(),
        }
    }
}

/// Errors produced by a [`crate::filter::RecordFilter`].
#[derive(Debug, Error)]
pub enum FilterError {
    /// The external evaluator is not installed.
    #[error("{program} required but not found. Install: {remedy}")]
    EvaluatorMissing {
        /// Program that could not be spawned.
        program: String,
        /// How to install it.
        remedy: &'static str,
    },

    /// The external evaluator did not finish in time.
    #[error("filter evaluation timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured bound.
        timeout_ms: u64,
    },

    /// The evaluator rejected the expression or input.
    #[error("filter failed: {stderr}")]
    Failed {
        /// Evaluator diagnostics.
        stderr: String,
    },

    /// The native evaluator could not parse the expression.
    #[error("cannot parse filter '{expression}': {message}")]
    Parse {
        /// Offending expression.
        expression: String,
        /// What went wrong.
        message: String,
    },

    /// Evaluator produced output that is not JSON.
    #[error("filter output is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Talking to the evaluator failed.
    #[error("filter I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::EvaluatorMissing { .. } => "evaluator_missing",
            Self::Timeout { .. } => "timeout",
            Self::Failed { .. } => "failed",
            Self::Parse { .. } => "parse",
            Self::Decode(_) => "decode",
            Self::Io(_) => "io",
        }
    }

    /// Whether the failure is about the environment rather than one input.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::EvaluatorMissing { .. })
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluator_missing_names_remedy() {
        let err = FilterError::EvaluatorMissing {
            program: "jq".into(),
            remedy: "brew install jq (macOS) or apt install jq (Linux)",
        };
        let msg = err.to_string();
        assert!(msg.contains("jq required"));
        assert!(msg.contains("apt install jq"));
        assert!(err.is_configuration());
    }

    #[test]
    fn emit_error_names_event_and_path() {
        let err = RegistryError::Emit {
            event: "decision.made".into(),
            path: PathBuf::from("/x/logs/2026-02-04/sess.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("decision.made"));
        assert!(msg.contains("sess.jsonl"));
        assert_eq!(err.error_kind(), "emit");
    }

    #[test]
    fn filter_error_wraps_transparently() {
        let err: RegistryError = FilterError::Timeout { timeout_ms: 50 }.into();
        assert_eq!(err.to_string(), "filter evaluation timed out after 50ms");
        assert_eq!(err.error_kind(), "timeout");
    }

    #[test]
    fn no_project_context_is_actionable() {
        let err = RegistryError::NoProjectContext {
            cwd: PathBuf::from("/tmp/work"),
        };
        assert!(err.to_string().contains("init-project"));
    }
}
