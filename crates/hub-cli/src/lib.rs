//! # hub-cli
//!
//! Operator tools over the registry tree. Each tool is a module exposing a
//! clap [`Parser`](clap::Parser) and a `run` function that writes to caller
//! supplied streams, so the binaries under `src/bin/` stay thin and the
//! behavior is testable against a temporary home.

#![deny(unsafe_code)]

pub mod cleanup_logs;
pub mod init_project;
pub mod query_logs;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use hub_settings::HubSettings;

/// Process inputs every tool reads: where home and cwd are, the merged
/// settings, and the clock.
#[derive(Clone, Debug)]
pub struct Environment {
    /// User home directory.
    pub home: PathBuf,
    /// Working directory the tool was started in.
    pub cwd: PathBuf,
    /// Layered settings.
    pub settings: HubSettings,
    /// Reference time for retention decisions.
    pub now: DateTime<Utc>,
}

impl Environment {
    /// Capture the current process environment.
    pub fn from_process() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Ok(Self {
            home: hub_settings::home_dir(),
            cwd,
            settings: hub_settings::get_settings().clone(),
            now: Utc::now(),
        })
    }
}

/// Entry point shared by the binaries.
///
/// Installs the tracing subscriber, runs `tool` against locked stdout and
/// stderr, and turns its result into an exit code. An error is printed to
/// stderr and exits 1.
pub fn main_with<F>(tool: F) -> ExitCode
where
    F: FnOnce(&Environment, &mut dyn Write, &mut dyn Write) -> Result<u8>,
{
    let env = match Environment::from_process() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    hub_core::logging::init_subscriber(&env.settings.logging.level);

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    match tool(&env, &mut out, &mut err) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let _ = writeln!(err, "error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `bytes` as kilobytes with one decimal.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn kb(bytes: u64) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
