use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::{LogFile, RetentionPolicy, cutoff, list_log_files};
use crate::errors::Result;

/// Why a file is scheduled for deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeleteReason {
    /// The partition is older than the retention window.
    Expired {
        /// Window in days.
        retention_days: u32,
    },
    /// The tree exceeds its size ceiling.
    OverSize {
        /// Ceiling in bytes.
        max_size_bytes: u64,
    },
    /// The tree exceeds its file count ceiling.
    OverCount {
        /// Ceiling in files.
        max_files: usize,
    },
}

impl fmt::Display for DeleteReason {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired { retention_days } => write!(f, "older than {retention_days} days"),
            Self::OverSize { max_size_bytes } => write!(
                f,
                "over size limit ({}MB)",
                *max_size_bytes as f64 / (1024.0 * 1024.0)
            ),
            Self::OverCount { max_files } => write!(f, "over file limit ({max_files})"),
        }
    }
}

/// A file the plan would delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlannedDeletion {
    /// File to delete.
    pub path: PathBuf,
    /// Its size in bytes.
    pub size: u64,
    /// Which ceiling put it on the list.
    pub reason: DeleteReason,
}

/// Deletions computed from one read of a `logs/` tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CleanupPlan {
    /// Directory the plan applies to.
    pub logs_dir: PathBuf,
    /// Files to delete, oldest first.
    pub deletions: Vec<PlannedDeletion>,
}

impl CleanupPlan {
    /// Bytes the plan frees.
    pub fn freed_bytes(&self) -> u64 {
        self.deletions.iter().map(|d| d.size).sum()
    }

    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }
}

/// Outcome of [`apply_cleanup`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Files removed.
    pub deleted_files: usize,
    /// Bytes removed.
    pub freed_bytes: u64,
    /// Empty date directories removed.
    pub removed_dirs: usize,
    /// Files that could not be removed, with the error.
    pub failures: Vec<(PathBuf, String)>,
}

impl RetentionPolicy {
    /// Compute what a cleanup of `logs_dir` at `now` would delete.
    ///
    /// Expired partitions go first. If the rest still exceeds the size ceiling,
    /// the oldest files are added until it is at or below 80% of the ceiling;
    /// the file count ceiling is then handled the same way.
    pub fn plan_cleanup(&self, logs_dir: &Path, now: DateTime<Utc>) -> Result<CleanupPlan> {
        self.plan(logs_dir, now, None)
    }

    /// Like [`plan_cleanup`](Self::plan_cleanup), but files in `now`'s date
    /// partition are never chosen by the size or count passes. Loggers of the
    /// running session are still appending there.
    pub fn plan_live_cleanup(&self, logs_dir: &Path, now: DateTime<Utc>) -> Result<CleanupPlan> {
        let today = now.format("%Y-%m-%d").to_string();
        self.plan(logs_dir, now, Some(&today))
    }

    #[instrument(skip(self), fields(logs_dir = %logs_dir.display()))]
    fn plan(
        &self,
        logs_dir: &Path,
        now: DateTime<Utc>,
        live_partition: Option<&str>,
    ) -> Result<CleanupPlan> {
        let is_live = |file: &LogFile| live_partition == Some(file.partition.as_str());
        let files = list_log_files(logs_dir)?;
        let expiry = cutoff(now, self.retention_days);

        let mut deletions = Vec::new();
        let mut remaining = Vec::new();
        for file in files {
            if file.date().is_some_and(|d| d < expiry) {
                deletions.push(PlannedDeletion {
                    path: file.path,
                    size: file.size,
                    reason: DeleteReason::Expired {
                        retention_days: self.retention_days,
                    },
                });
            } else {
                remaining.push(file);
            }
        }

        let mut current: u64 = remaining.iter().map(|f| f.size).sum();
        if current > self.max_size_bytes {
            // 80% of the ceiling, without overflowing near u64::MAX.
            let target = self.max_size_bytes / 5 * 4 + self.max_size_bytes % 5 * 4 / 5;
            let mut kept = Vec::with_capacity(remaining.len());
            for file in remaining {
                if current > target && !is_live(&file) {
                    current -= file.size;
                    deletions.push(PlannedDeletion {
                        path: file.path,
                        size: file.size,
                        reason: DeleteReason::OverSize {
                            max_size_bytes: self.max_size_bytes,
                        },
                    });
                } else {
                    kept.push(file);
                }
            }
            remaining = kept;
        }

        if remaining.len() > self.max_files {
            let target = self.max_files * 4 / 5;
            let excess = remaining.len() - target;
            let candidates = remaining.into_iter().filter(|f| !is_live(f));
            for file in candidates.take(excess) {
                deletions.push(PlannedDeletion {
                    path: file.path,
                    size: file.size,
                    reason: DeleteReason::OverCount {
                        max_files: self.max_files,
                    },
                });
            }
        }

        debug!(count = deletions.len(), "cleanup planned");
        Ok(CleanupPlan {
            logs_dir: logs_dir.to_path_buf(),
            deletions,
        })
    }
}

/// Delete every planned file, then remove date directories left empty.
///
/// Individual failures are collected in the report rather than aborting.
pub fn apply_cleanup(plan: &CleanupPlan) -> CleanupReport {
    let mut report = CleanupReport::default();
    for deletion in &plan.deletions {
        match fs::remove_file(&deletion.path) {
            Ok(()) => {
                report.deleted_files += 1;
                report.freed_bytes += deletion.size;
            }
            Err(err) => {
                warn!(path = %deletion.path.display(), error = %err, "failed to delete log file");
                report.failures.push((deletion.path.clone(), err.to_string()));
            }
        }
    }
    report.removed_dirs = remove_empty_dirs(&plan.logs_dir);
    report
}

fn remove_empty_dirs(logs_dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(logs_dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_empty = path.is_dir()
            && fs::read_dir(&path).is_ok_and(|mut inner| inner.next().is_none());
        if is_empty && fs::remove_dir(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
