use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use hub_core::constants::{COMPACTED_SUFFIX, LOG_EXTENSION};

use super::{RetentionPolicy, cutoff, list_log_files};
use crate::entry::LogLevel;
use crate::errors::{RegistryError, Result};

/// Event types a compacted summary keeps regardless of level.
pub const PRESERVED_EVENTS: [&str; 9] = [
    "decision.made",
    "escalation.raised",
    "handoff.initiated",
    "session.started",
    "session.ended",
    "session.error",
    "task.started",
    "task.completed",
    "context.compacted",
];

/// Whether a decoded line belongs in a compacted summary.
pub fn should_preserve(value: &Value) -> bool {
    let evt = value.get("evt").and_then(Value::as_str).unwrap_or_default();
    if PRESERVED_EVENTS.contains(&evt) {
        return true;
    }
    value
        .get("lvl")
        .and_then(|v| serde_json::from_value::<LogLevel>(v.clone()).ok())
        .is_some_and(LogLevel::is_problem)
}

/// One file the plan would summarize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedCompaction {
    /// Raw session file.
    pub source: PathBuf,
    /// `{session}_compacted.jsonl` beside it.
    pub target: PathBuf,
    /// Size of the raw file.
    pub original_size: u64,
    /// Lines read from the raw file.
    pub total_lines: usize,
    /// Lines kept verbatim, in order.
    #[serde(skip)]
    pub kept: Vec<String>,
}

impl PlannedCompaction {
    /// Bytes the kept lines occupy once written.
    pub fn compacted_size(&self) -> u64 {
        self.kept.iter().map(|l| l.len() as u64 + 1).sum()
    }
}

/// Compactions computed from one read of a `logs/` tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompactionPlan {
    /// Directory the plan applies to.
    pub logs_dir: PathBuf,
    /// Files to summarize, oldest first.
    pub files: Vec<PlannedCompaction>,
}

impl CompactionPlan {
    /// Bytes the plan would save.
    pub fn saved_bytes(&self) -> u64 {
        self.files
            .iter()
            .map(|f| f.original_size.saturating_sub(f.compacted_size()))
            .sum()
    }
}

/// Outcome of [`apply_compaction`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Files replaced by a summary.
    pub compacted_files: usize,
    /// Bytes saved.
    pub saved_bytes: u64,
    /// Files that could not be compacted, with the error.
    pub failures: Vec<(PathBuf, String)>,
}

impl RetentionPolicy {
    /// Compute which files in partitions older than the compaction window
    /// would be summarized, and what each summary keeps.
    ///
    /// Existing summaries are skipped, as are files with nothing worth
    /// keeping.
    #[instrument(skip(self), fields(logs_dir = %logs_dir.display()))]
    pub fn plan_compaction(&self, logs_dir: &Path, now: DateTime<Utc>) -> Result<CompactionPlan> {
        let threshold = cutoff(now, self.compact_after_days);
        let mut files = Vec::new();
        for file in list_log_files(logs_dir)? {
            if file.is_compacted() || !file.date().is_some_and(|d| d < threshold) {
                continue;
            }
            let text = fs::read_to_string(&file.path)
                .map_err(|e| RegistryError::io("reading log file", &file.path, e))?;
            let mut total_lines = 0;
            let mut kept = Vec::new();
            for line in text.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                total_lines += 1;
                match serde_json::from_str::<Value>(line) {
                    Ok(value) if should_preserve(&value) => kept.push(line.to_string()),
                    Ok(_) => {}
                    Err(err) => {
                        debug!(path = %file.path.display(), error = %err, "dropping corrupt line");
                    }
                }
            }
            if kept.is_empty() {
                continue;
            }
            files.push(PlannedCompaction {
                target: compacted_path(&file.path),
                source: file.path,
                original_size: file.size,
                total_lines,
                kept,
            });
        }
        Ok(CompactionPlan {
            logs_dir: logs_dir.to_path_buf(),
            files,
        })
    }
}

/// `{dir}/{stem}_compacted.jsonl` for a raw session file.
pub fn compacted_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}{COMPACTED_SUFFIX}.{LOG_EXTENSION}"))
}

/// Write each summary through a temporary file, rename it into place, then
/// remove the raw file. An existing summary is extended, not replaced.
pub fn apply_compaction(plan: &CompactionPlan) -> CompactionReport {
    let mut report = CompactionReport::default();
    for file in &plan.files {
        match compact_one(file) {
            Ok(saved) => {
                report.compacted_files += 1;
                report.saved_bytes += saved;
            }
            Err(err) => {
                warn!(path = %file.source.display(), error = %err, "failed to compact log file");
                report.failures.push((file.source.clone(), err.to_string()));
            }
        }
    }
    report
}

fn compact_one(file: &PlannedCompaction) -> Result<u64> {
    let mut body = match fs::read(&file.target) {
        Ok(existing) => existing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(RegistryError::io("reading compacted file", &file.target, err)),
    };
    if body.last().is_some_and(|b| *b != b'\n') {
        body.push(b'\n');
    }
    for line in &file.kept {
        body.extend_from_slice(line.as_bytes());
        body.push(b'\n');
    }

    let tmp = file.target.with_extension(format!("{LOG_EXTENSION}.tmp"));
    let mut out =
        fs::File::create(&tmp).map_err(|e| RegistryError::io("creating temp file", &tmp, e))?;
    out.write_all(&body)
        .and_then(|()| out.sync_all())
        .map_err(|e| RegistryError::io("writing temp file", &tmp, e))?;
    drop(out);
    fs::rename(&tmp, &file.target)
        .map_err(|e| RegistryError::io("renaming compacted file", &file.target, e))?;
    fs::remove_file(&file.source)
        .map_err(|e| RegistryError::io("removing compacted source", &file.source, e))?;
    debug!(
        source = %file.source.display(),
        kept = file.kept.len(),
        total = file.total_lines,
        "compacted log file"
    );
    Ok(file.original_size.saturating_sub(file.compacted_size()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
