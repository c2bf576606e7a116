//! Reading and filtering session logs.
//!
//! Files are decoded line by line. A line that is not JSON is skipped and
//! reported as a [`Diagnostic`]; the rest of the file still counts. Missing
//! files and directories read as empty.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use hub_core::SessionId;
use hub_core::constants::LOG_EXTENSION;

use crate::entry::LogEntry;
use crate::errors::{RegistryError, Result};
use crate::filter::RecordFilter;
use crate::logger::EventLogger;
use crate::retention::compacted_path;

/// Something in a file that could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// File concerned.
    pub path: PathBuf,
    /// 1-based line number, when the problem is a single input line.
    pub line: Option<usize>,
    /// What went wrong.
    pub message: String,
}

/// Outcome of scanning one file.
#[derive(Clone, Debug, PartialEq)]
pub struct FileScan {
    /// File scanned.
    pub path: PathBuf,
    /// Filter outputs, in file order.
    pub values: Vec<Value>,
    /// Skipped lines.
    pub diagnostics: Vec<Diagnostic>,
    /// Why the filter could not be applied, if it failed for this file.
    pub degraded: Option<String>,
}

/// Typed results of [`QueryEngine::query`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResult {
    /// Matching entries, in file order.
    pub entries: Vec<LogEntry>,
    /// Skipped lines and non-record outputs.
    pub diagnostics: Vec<Diagnostic>,
}

/// Decoded lines of one file plus the lines that failed to decode.
pub fn read_records(path: &Path) -> Result<(Vec<Value>, Vec<Diagnostic>)> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok((Vec::new(), Vec::new()));
        }
        Err(err) => return Err(RegistryError::io("reading log file", path, err)),
    };
    let mut records = Vec::new();
    let mut diagnostics = Vec::new();
    for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(value) => records.push(value),
            Err(err) => {
                warn!(path = %path.display(), line = idx + 1, error = %err, "skipping corrupt log line");
                diagnostics.push(Diagnostic {
                    path: path.to_path_buf(),
                    line: Some(idx + 1),
                    message: err.to_string(),
                });
            }
        }
    }
    Ok((records, diagnostics))
}

/// Every `*.jsonl` under `logs_dir`, sorted by path.
pub fn find_logs(logs_dir: &Path) -> Vec<PathBuf> {
    if !logs_dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(logs_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION))
        .collect()
}

/// Runs filter expressions over one registry's logs.
pub struct QueryEngine {
    logs_dir: PathBuf,
    filter: Box<dyn RecordFilter>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("logs_dir", &self.logs_dir)
            .field("filter", &self.filter.name())
            .finish()
    }
}

impl QueryEngine {
    /// Engine over `logs_dir` using `filter`.
    pub fn new(logs_dir: impl Into<PathBuf>, filter: Box<dyn RecordFilter>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            filter,
        }
    }

    /// Engine over the registry `logger` writes to.
    pub fn for_logger(logger: &EventLogger, filter: Box<dyn RecordFilter>) -> Self {
        Self::new(logger.logs_dir(), filter)
    }

    /// The directory queried.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Entries matching `expression`.
    ///
    /// With a session, reads `{date}/{session}.jsonl` (date defaulting to
    /// today, UTC) together with its compacted summary when one exists.
    /// Without one, reads every file in the `date` partition, or the whole
    /// tree when no date is given. A file that cannot be read or filtered is
    /// reported as a diagnostic and the others still count; only a missing
    /// evaluator is an error.
    pub fn query(
        &self,
        expression: &str,
        session: Option<&SessionId>,
        date: Option<NaiveDate>,
    ) -> Result<QueryResult> {
        let files = match session {
            Some(session) => {
                let date = date.unwrap_or_else(|| Utc::now().date_naive());
                let raw = self
                    .logs_dir
                    .join(date.format("%Y-%m-%d").to_string())
                    .join(format!("{session}.{LOG_EXTENSION}"));
                // The summary predates anything appended to a re-created raw file.
                [compacted_path(&raw), raw]
                    .into_iter()
                    .filter(|p| p.exists())
                    .collect()
            }
            None => match date {
                Some(date) => find_logs(&self.logs_dir.join(date.format("%Y-%m-%d").to_string())),
                None => find_logs(&self.logs_dir),
            },
        };

        let mut result = QueryResult::default();
        for path in files {
            let mut scan = self.scan_file(path, expression)?;
            result.diagnostics.append(&mut scan.diagnostics);
            if let Some(reason) = scan.degraded {
                result.diagnostics.push(Diagnostic {
                    path: scan.path.clone(),
                    line: None,
                    message: reason,
                });
            }
            for value in scan.values {
                match serde_json::from_value::<LogEntry>(value) {
                    Ok(entry) => result.entries.push(entry),
                    Err(err) => result.diagnostics.push(Diagnostic {
                        path: scan.path.clone(),
                        line: None,
                        message: format!("filter output is not a log entry: {err}"),
                    }),
                }
            }
        }
        Ok(result)
    }

    /// Raw filter outputs for every log file under each of `logs_dirs`.
    ///
    /// `session_hint` keeps only files whose name contains it, ignoring case.
    /// A filter failure marks that file degraded and the scan continues; a
    /// missing evaluator aborts since no file could succeed.
    #[instrument(skip(self), fields(filter = self.filter.name()))]
    pub fn scan(
        &self,
        logs_dirs: &[PathBuf],
        expression: &str,
        session_hint: Option<&str>,
    ) -> Result<Vec<FileScan>> {
        let hint = session_hint.map(str::to_lowercase);
        let mut scans = Vec::new();
        for dir in logs_dirs {
            for path in find_logs(dir) {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                if hint.as_deref().is_some_and(|h| !name.contains(h)) {
                    continue;
                }
                scans.push(self.scan_file(path, expression)?);
            }
        }
        debug!(files = scans.len(), "scan complete");
        Ok(scans)
    }

    fn scan_file(&self, path: PathBuf, expression: &str) -> Result<FileScan> {
        let (records, diagnostics) = match read_records(&path) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read log file");
                return Ok(FileScan {
                    path,
                    values: Vec::new(),
                    diagnostics: Vec::new(),
                    degraded: Some(err.to_string()),
                });
            }
        };
        if records.is_empty() {
            return Ok(FileScan {
                path,
                values: Vec::new(),
                diagnostics,
                degraded: None,
            });
        }
        match self.filter.filter(records, expression) {
            Ok(values) => Ok(FileScan {
                path,
                values,
                diagnostics,
                degraded: None,
            }),
            Err(err) if err.is_configuration() => Err(err.into()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "filter failed for file");
                Ok(FileScan {
                    path,
                    values: Vec::new(),
                    diagnostics,
                    degraded: Some(err.to_string()),
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
