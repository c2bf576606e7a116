//! Age- and size-based retention for a `logs/` tree.
//!
//! All planning is a pure read of the tree: [`RetentionPolicy::plan_cleanup`]
//! and [`RetentionPolicy::plan_compaction`] never write, so a dry run can be
//! repeated and yields the same plan. Applying a plan is a separate step.
//!
//! Files are ordered oldest-first by (date partition, mtime, path).

mod cleanup;
mod compact;

pub use cleanup::{CleanupPlan, CleanupReport, DeleteReason, PlannedDeletion, apply_cleanup};
pub use compact::{
    CompactionPlan, CompactionReport, PRESERVED_EVENTS, PlannedCompaction, apply_compaction,
    compacted_path, should_preserve,
};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use hub_core::constants::LOG_EXTENSION;
use hub_settings::RetentionSettings;

use crate::errors::{RegistryError, Result};

/// Retention ceilings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetentionPolicy {
    /// Partitions older than this many days are deleted.
    pub retention_days: u32,
    /// Partitions older than this many days are compacted.
    pub compact_after_days: u32,
    /// Total size ceiling in bytes.
    pub max_size_bytes: u64,
    /// File count ceiling.
    pub max_files: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionSettings::default())
    }
}

impl From<&RetentionSettings> for RetentionPolicy {
    fn from(settings: &RetentionSettings) -> Self {
        Self {
            retention_days: settings.retention_days,
            compact_after_days: settings.compact_after_days,
            max_size_bytes: settings.max_size_bytes(),
            max_files: settings.max_files,
        }
    }
}

/// One `.jsonl` file in the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFile {
    /// Full path.
    pub path: PathBuf,
    /// Name of the containing directory (`YYYY-MM-DD` for a date partition).
    pub partition: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl LogFile {
    /// The partition as a date, if it is one.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.partition, "%Y-%m-%d").ok()
    }

    /// Whether this is a `_compacted` summary.
    pub fn is_compacted(&self) -> bool {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.ends_with(hub_core::constants::COMPACTED_SUFFIX))
    }
}

/// Every log file under `logs_dir`, oldest first. A missing directory is
/// empty.
pub fn list_log_files(logs_dir: &Path) -> Result<Vec<LogFile>> {
    if !logs_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(logs_dir).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(logs_dir).to_path_buf();
            RegistryError::io("walking log directory", path, e.into())
        })?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION)
        {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| RegistryError::io("reading file metadata", path, e.into()))?;
        let partition = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        files.push(LogFile {
            path: path.to_path_buf(),
            partition,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    files.sort_by(|a, b| {
        (&a.partition, a.modified, &a.path).cmp(&(&b.partition, b.modified, &b.path))
    });
    Ok(files)
}

/// Snapshot of a `logs/` tree against a policy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogStats {
    /// Directory inspected.
    pub logs_dir: PathBuf,
    /// Number of log files.
    pub total_files: usize,
    /// Bytes across all log files.
    pub total_size_bytes: u64,
    /// Earliest date partition.
    pub oldest_date: Option<String>,
    /// Latest date partition.
    pub newest_date: Option<String>,
    /// Every date partition holding files, sorted.
    pub dates: Vec<String>,
    /// Ceilings the snapshot is compared with.
    pub policy: RetentionPolicy,
    /// `total_size_bytes > max_size_bytes`.
    pub over_size: bool,
    /// `total_files > max_files`.
    pub over_count: bool,
}

impl LogStats {
    /// Total size in megabytes.
    #[allow(clippy::cast_precision_loss)]
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl RetentionPolicy {
    /// Current usage of `logs_dir`.
    pub fn status(&self, logs_dir: &Path) -> Result<LogStats> {
        let files = list_log_files(logs_dir)?;
        let total_size_bytes = files.iter().map(|f| f.size).sum();
        let mut dates: Vec<String> = files
            .iter()
            .filter(|f| f.date().is_some())
            .map(|f| f.partition.clone())
            .collect();
        dates.sort();
        dates.dedup();
        Ok(LogStats {
            logs_dir: logs_dir.to_path_buf(),
            total_files: files.len(),
            total_size_bytes,
            oldest_date: dates.first().cloned(),
            newest_date: dates.last().cloned(),
            dates,
            policy: self.clone(),
            over_size: total_size_bytes > self.max_size_bytes,
            over_count: files.len() > self.max_files,
        })
    }

    /// Plan and apply a cleanup in one step, sparing `now`'s partition from
    /// the size and count passes.
    pub fn prune(&self, logs_dir: &Path, now: DateTime<Utc>) -> Result<CleanupReport> {
        let plan = self.plan_live_cleanup(logs_dir, now)?;
        Ok(apply_cleanup(&plan))
    }
}

/// The first date that is *not* older than `days` days before `now`.
fn cutoff(now: DateTime<Utc>, days: u32) -> NaiveDate {
    let today = now.date_naive();
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
