//! `cleanup-logs`: report on, compact, and prune a registry's logs tree.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use clap::Parser;

use hub_registry::context::{ContextResolver, Scope};
use hub_registry::retention::{self, LogStats, RetentionPolicy};

use crate::{Environment, kb};

/// Planned deletions listed in a dry run before eliding the rest.
const DRY_RUN_LISTING: usize = 10;

/// Retention and compaction for agent session logs.
#[derive(Parser, Debug, Default)]
#[command(name = "cleanup-logs", about = "Apply retention and compaction to agent session logs")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Print usage statistics and exit.
    #[arg(long)]
    pub status: bool,

    /// Show what would change without touching any file.
    #[arg(long)]
    pub dry_run: bool,

    /// Compact old sessions before pruning.
    #[arg(long)]
    pub compact: bool,

    /// Retention window in days (overrides settings).
    #[arg(long, value_name = "DAYS")]
    pub retention: Option<u32>,

    /// Total size ceiling in megabytes (overrides settings).
    #[arg(long, value_name = "MB")]
    pub max_size: Option<f64>,

    /// File count ceiling (overrides settings).
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Compaction window in days (overrides settings).
    #[arg(long, value_name = "DAYS")]
    pub compact_days: Option<u32>,

    /// Operate on the enclosing project registry instead of the global one.
    #[arg(long)]
    pub project: bool,
}

impl Cli {
    /// Settings ceilings with command-line overrides applied.
    pub fn policy(&self, env: &Environment) -> Result<RetentionPolicy> {
        let mut settings = env.settings.clone();
        let retention = &mut settings.retention;
        if let Some(days) = self.retention {
            retention.retention_days = days;
        }
        if let Some(mb) = self.max_size {
            retention.max_size_mb = mb;
        }
        if let Some(files) = self.max_files {
            retention.max_files = files;
        }
        if let Some(days) = self.compact_days {
            retention.compact_after_days = days;
        }
        hub_settings::validate(&settings)?;
        Ok(RetentionPolicy::from(&settings.retention))
    }
}

/// Run the selected operations and report to `out`.
pub fn run(cli: &Cli, env: &Environment, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
    let policy = cli.policy(env)?;
    let registry = &env.settings.registry;
    let scope = if cli.project {
        Scope::Project
    } else {
        Scope::Global
    };
    let root = ContextResolver::new(registry.marker_dir.clone()).resolve_scoped(
        scope,
        &env.cwd,
        &env.home,
    )?;
    let logs_dir = root.logs_dir(&registry.logs_dir);

    if cli.status {
        print_stats(&policy.status(&logs_dir)?, out)?;
        return Ok(0);
    }

    if cli.compact {
        compact(&policy, &logs_dir, cli.dry_run, env, out, err)?;
    }
    prune(&policy, &logs_dir, cli.dry_run, env, out, err)?;
    Ok(0)
}

fn compact(
    policy: &RetentionPolicy,
    logs_dir: &Path,
    dry_run: bool,
    env: &Environment,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let plan = policy.plan_compaction(logs_dir, env.now)?;
    if dry_run {
        writeln!(
            out,
            "Would compact {} files, saving {}",
            plan.files.len(),
            kb(plan.saved_bytes())
        )?;
        for file in &plan.files {
            writeln!(
                out,
                "  {} ({} of {} lines kept)",
                file.source.display(),
                file.kept.len(),
                file.total_lines
            )?;
        }
        return Ok(());
    }
    let report = retention::apply_compaction(&plan);
    writeln!(
        out,
        "Compacted {} files, saved {}",
        report.compacted_files,
        kb(report.saved_bytes)
    )?;
    for (path, reason) in &report.failures {
        writeln!(err, "  warning: failed to compact {}: {reason}", path.display())?;
    }
    Ok(())
}

fn prune(
    policy: &RetentionPolicy,
    logs_dir: &Path,
    dry_run: bool,
    env: &Environment,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    let plan = policy.plan_cleanup(logs_dir, env.now)?;
    if dry_run {
        writeln!(
            out,
            "Would delete {} files, freeing {}",
            plan.deletions.len(),
            kb(plan.freed_bytes())
        )?;
        for deletion in plan.deletions.iter().take(DRY_RUN_LISTING) {
            writeln!(out, "  {} ({})", deletion.path.display(), deletion.reason)?;
        }
        if plan.deletions.len() > DRY_RUN_LISTING {
            writeln!(out, "  ... and {} more", plan.deletions.len() - DRY_RUN_LISTING)?;
        }
        return Ok(());
    }
    let report = retention::apply_cleanup(&plan);
    writeln!(
        out,
        "Deleted {} files, freed {}",
        report.deleted_files,
        kb(report.freed_bytes)
    )?;
    if report.removed_dirs > 0 {
        writeln!(out, "Removed {} empty directories", report.removed_dirs)?;
    }
    for (path, reason) in &report.failures {
        writeln!(err, "  warning: failed to delete {}: {reason}", path.display())?;
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn print_stats(stats: &LogStats, out: &mut dyn Write) -> Result<()> {
    let policy = &stats.policy;
    writeln!(out, "Log Statistics:")?;
    writeln!(out, "  Directory: {}", stats.logs_dir.display())?;
    writeln!(out, "  Total files: {} (limit {})", stats.total_files, policy.max_files)?;
    writeln!(
        out,
        "  Total size: {:.2}MB (limit {:.2}MB)",
        stats.total_size_mb(),
        policy.max_size_bytes as f64 / (1024.0 * 1024.0)
    )?;
    match (&stats.oldest_date, &stats.newest_date) {
        (Some(oldest), Some(newest)) => {
            writeln!(out, "  Date range: {oldest} to {newest} ({} days)", stats.dates.len())?;
        }
        _ => writeln!(out, "  Date range: none")?,
    }
    writeln!(
        out,
        "  Retention: {} days, compaction after {} days",
        policy.retention_days, policy.compact_after_days
    )?;
    if stats.over_size {
        writeln!(out, "  Warning: over size limit")?;
    }
    if stats.over_count {
        writeln!(out, "  Warning: over file limit")?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{capture, env_at};
    use chrono::{TimeZone, Utc};
    use std::fs;

    const DECISION: &str = r#"{"ts":"2026-01-10T00:00:00Z","lvl":"info","cid":"corr_a_001","aid":"spec:x","evt":"decision.made","msg":"Use JWT"}"#;
    const TOOL: &str = r#"{"ts":"2026-01-10T00:00:01Z","lvl":"debug","cid":"corr_a_002","aid":"spec:x","evt":"hook.pre_tool","msg":"Read"}"#;

    fn fixture() -> (tempfile::TempDir, Environment) {
        let home = tempfile::tempdir().unwrap();
        let logs = home.path().join(".claude/logs");
        for (date, session) in [("2026-01-01", "sess_old"), ("2026-01-10", "sess_mid"), ("2026-01-20", "sess_new")] {
            let dir = logs.join(date);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{session}.jsonl")), format!("{DECISION}\n{TOOL}\n")).unwrap();
        }
        let mut env = env_at(home.path(), home.path());
        env.now = Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap();
        (home, env)
    }

    #[test]
    fn overrides_apply_to_policy() {
        let home = tempfile::tempdir().unwrap();
        let env = env_at(home.path(), home.path());
        let cli = Cli::parse_from(["cleanup-logs", "--retention", "3", "--max-files", "5", "--max-size", "1"]);
        let policy = cli.policy(&env).unwrap();
        assert_eq!(policy.retention_days, 3);
        assert_eq!(policy.max_files, 5);
        assert_eq!(policy.max_size_bytes, 1024 * 1024);
        assert_eq!(policy.compact_after_days, 3);
    }

    #[test]
    fn zero_retention_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let env = env_at(home.path(), home.path());
        let cli = Cli::parse_from(["cleanup-logs", "--retention", "0"]);
        assert!(cli.policy(&env).is_err());
    }

    #[test]
    fn status_reports_without_changes() {
        let (home, env) = fixture();
        let cli = Cli::parse_from(["cleanup-logs", "--status"]);
        let (code, out, _) = capture(|o, e| run(&cli, &env, o, e));
        assert_eq!(code, 0);
        assert!(out.starts_with("Log Statistics:"));
        assert!(out.contains("Total files: 3"));
        assert!(out.contains("2026-01-01 to 2026-01-20"));
        assert!(home.path().join(".claude/logs/2026-01-01/sess_old.jsonl").exists());
    }

    #[test]
    fn dry_run_lists_but_keeps_files() {
        let (home, env) = fixture();
        let cli = Cli::parse_from(["cleanup-logs", "--dry-run"]);
        let (code, first, _) = capture(|o, e| run(&cli, &env, o, e));
        assert_eq!(code, 0);
        assert!(first.starts_with("Would delete 1 files"));
        assert!(first.contains("sess_old.jsonl (older than 7 days)"));
        assert!(home.path().join(".claude/logs/2026-01-01/sess_old.jsonl").exists());

        let (_, second, _) = capture(|o, e| run(&cli, &env, o, e));
        assert_eq!(first, second);
    }

    #[test]
    fn prune_deletes_expired_partition() {
        let (home, env) = fixture();
        let cli = Cli::parse_from(["cleanup-logs"]);
        let (code, out, _) = capture(|o, e| run(&cli, &env, o, e));
        assert_eq!(code, 0);
        assert!(out.contains("Deleted 1 files"));
        assert!(!home.path().join(".claude/logs/2026-01-01").exists());
        assert!(home.path().join(".claude/logs/2026-01-20/sess_new.jsonl").exists());
    }

    #[test]
    fn compact_summarizes_older_sessions() {
        let (home, env) = fixture();
        let cli = Cli::parse_from(["cleanup-logs", "--compact"]);
        let (code, out, _) = capture(|o, e| run(&cli, &env, o, e));
        assert_eq!(code, 0);
        assert!(out.contains("Compacted"));

        let mid = home.path().join(".claude/logs/2026-01-10");
        assert!(!mid.join("sess_mid.jsonl").exists());
        let summary = fs::read_to_string(mid.join("sess_mid_compacted.jsonl")).unwrap();
        assert_eq!(summary, format!("{DECISION}\n"));
        assert!(home.path().join(".claude/logs/2026-01-20/sess_new.jsonl").exists());
    }

    #[test]
    fn project_scope_requires_marker() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let env = env_at(home.path(), work.path());
        let cli = Cli::parse_from(["cleanup-logs", "--project", "--status"]);
        let mut out = Vec::new();
        let mut err = Vec::new();
        let e = run(&cli, &env, &mut out, &mut err).unwrap_err();
        assert!(e.to_string().contains("not in a project context"));
    }
}
