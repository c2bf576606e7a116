//! `query-logs`: run a filter over every session log in the global and/or
//! project registry.
//!
//! Filter outputs go to stdout, one compact JSON value per line. File headers
//! and per-file warnings go to stderr so stdout can be piped onward.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use hub_registry::context::ContextResolver;
use hub_registry::filter::{JqFilter, NativeFilter, RecordFilter};
use hub_registry::query::QueryEngine;
use hub_settings::FilterBackend;

use crate::Environment;

/// Query agent session logs with a jq filter.
#[derive(Parser, Debug)]
#[command(
    name = "query-logs",
    about = "Query agent session logs with a jq filter",
    after_help = "Examples:\n  query-logs 'select(.evt == \"decision.made\")'\n  query-logs 'select(.lvl == \"error\")' sess_20260101"
)]
pub struct Cli {
    /// Filter expression applied to each log file's records.
    pub filter: String,

    /// Only read files whose name contains this session id.
    pub session: Option<String>,

    /// Search only the global registry (`~/.claude/logs`).
    #[arg(long, conflicts_with = "project")]
    pub global: bool,

    /// Search only the project registry enclosing the working directory.
    #[arg(long)]
    pub project: bool,

    /// Use the built-in filter evaluator instead of `jq`.
    #[arg(long)]
    pub native: bool,
}

impl Cli {
    /// Logs directories to search, in global-then-project order.
    ///
    /// The project registry is the nearest marker enclosing `cwd`, found the
    /// same way loggers find it; without one only the global registry counts.
    pub fn logs_dirs(&self, env: &Environment) -> Vec<PathBuf> {
        let registry = &env.settings.registry;
        let resolver = ContextResolver::new(registry.marker_dir.clone());
        let mut dirs = Vec::with_capacity(2);
        if !self.project {
            dirs.push(resolver.global_root(&env.home).logs_dir(&registry.logs_dir));
        }
        if !self.global {
            let root = resolver.resolve_root(&env.cwd, &env.home);
            if root.is_project() {
                dirs.push(root.logs_dir(&registry.logs_dir));
            }
        }
        dirs
    }
}

/// Run the query and report to `out` and `err`.
pub fn run(cli: &Cli, env: &Environment, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
    let query = &env.settings.query;
    let filter: Box<dyn RecordFilter> = if cli.native || query.backend == FilterBackend::Native {
        Box::new(NativeFilter)
    } else {
        let jq = JqFilter::new(query.jq_binary.clone(), Duration::from_millis(query.timeout_ms));
        if let Err(e) = jq.probe() {
            writeln!(err, "error: {e}")?;
            return Ok(1);
        }
        Box::new(jq)
    };

    let dirs = cli.logs_dirs(env);
    let Some(primary) = dirs.first() else {
        writeln!(err, "no log files found")?;
        return Ok(0);
    };
    let engine = QueryEngine::new(primary.clone(), filter);
    let scans = engine.scan(&dirs, &cli.filter, cli.session.as_deref())?;
    if scans.is_empty() {
        writeln!(err, "no log files found")?;
        return Ok(0);
    }

    for scan in scans {
        writeln!(err, "# {}", scan.path.display())?;
        for value in &scan.values {
            writeln!(out, "{}", serde_json::to_string(value)?)?;
        }
        for diagnostic in &scan.diagnostics {
            match diagnostic.line {
                Some(line) => writeln!(err, "  warning: line {line}: {}", diagnostic.message)?,
                None => writeln!(err, "  warning: {}", diagnostic.message)?,
            }
        }
        if let Some(reason) = &scan.degraded {
            writeln!(err, "  warning: {reason}")?;
        }
    }
    Ok(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
