//! `init-project`: turn a directory into a project-scoped registry root.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::Environment;

/// Manifest file written under the marker directory.
pub const MANIFEST_FILE: &str = "manifest.md";

/// Template read from the global registry.
pub const TEMPLATE_PATH: &str = "templates/project-manifest.md";

/// Initialize a project registry (`{path}/.claude`).
#[derive(Parser, Debug)]
#[command(name = "init-project", about = "Initialize a project-scoped agent registry")]
pub struct Cli {
    /// Project directory.
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Create the marker tree and manifest, or report that it already exists.
pub fn run(cli: &Cli, env: &Environment, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
    let requested = if cli.path.is_absolute() {
        cli.path.clone()
    } else {
        env.cwd.join(&cli.path)
    };
    let project = requested
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", requested.display()))?;

    let marker = &env.settings.registry.marker_dir;
    let root = project.join(marker);
    let manifest = root.join(MANIFEST_FILE);
    if manifest.exists() {
        writeln!(out, "exists: {}", manifest.display())?;
        return Ok(0);
    }

    let template_path = env.home.join(marker).join(TEMPLATE_PATH);
    let template = match fs::read_to_string(&template_path) {
        Ok(template) => template,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            writeln!(err, "error: template not found: {}", template_path.display())?;
            return Ok(1);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", template_path.display()));
        }
    };

    let name = project
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let rendered = template
        .replace("{project-name}", &name)
        .replace("{project-root}", &project.to_string_lossy());

    for sub in [env.settings.registry.logs_dir.as_str(), "skills"] {
        let dir = root.join(sub);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        writeln!(out, "created: {}/", dir.display())?;
    }
    fs::write(&manifest, rendered)
        .with_context(|| format!("Failed to write {}", manifest.display()))?;
    tracing::debug!(project = %project.display(), "project registry initialized");
    writeln!(out, "initialized: {}", manifest.display())?;
    Ok(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
