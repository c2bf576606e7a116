//! # hub-settings
//!
//! Configuration management with layered sources for the agent hub.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HubSettings::default()`]
//! 2. **User file**: `~/.claude/hub.json` (merged over defaults)
//! 3. **Environment variables**: `HUB_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use hub_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("retention: {} days", settings.retention.retention_days);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    home_dir, layered, load_settings, load_settings_from_path, settings_path,
    settings_path_for_home, validate,
};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`]. Falls back to compiled
/// defaults if loading fails.
static SETTINGS: OnceLock<HubSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.claude/hub.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, the failure is logged and compiled defaults are returned.
pub fn get_settings() -> &'static HubSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to default settings");
            HubSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: HubSettings) -> std::result::Result<(), HubSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
