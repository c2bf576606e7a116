//! Settings loading with layered sources.
//!
//! Loading flow:
//! 1. Start with compiled [`HubSettings::default()`]
//! 2. If `~/.claude/hub.json` exists, merge user values over defaults
//! 3. Apply `HUB_*` environment overrides (highest priority)
//!
//! Nested keys in the environment are separated by a double underscore:
//! `HUB_QUERY__TIMEOUT_MS=5000` sets `query.timeout_ms`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use tracing::debug;

use hub_core::constants::MARKER_DIR;

use crate::errors::{Result, SettingsError};
use crate::types::HubSettings;

/// Settings file name inside the global registry root.
pub const SETTINGS_FILE: &str = "hub.json";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "HUB_";

/// The user's home directory (`$HOME`, falling back to `/tmp`).
pub fn home_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
}

/// Resolve the path to the settings file (`~/.claude/hub.json`).
pub fn settings_path() -> PathBuf {
    settings_path_for_home(&home_dir())
}

/// Settings file path for a specific home directory.
pub fn settings_path_for_home(home: &Path) -> PathBuf {
    home.join(MARKER_DIR).join(SETTINGS_FILE)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HubSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file contributes nothing. Invalid JSON or values of the wrong
/// type are errors, as are values rejected by [`validate`].
pub fn load_settings_from_path(path: &Path) -> Result<HubSettings> {
    if path.exists() {
        debug!(?path, "loading settings from file");
    } else {
        debug!(?path, "settings file not found, using defaults");
    }
    let settings: HubSettings = layered(path).extract()?;
    validate(&settings)?;
    Ok(settings)
}

/// The merged provider stack for `path`, before extraction.
pub fn layered(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(HubSettings::default()))
        .merge(Json::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Reject values the registry cannot operate with.
pub fn validate(settings: &HubSettings) -> Result<()> {
    let retention = &settings.retention;
    if retention.retention_days == 0 {
        return Err(SettingsError::InvalidValue(
            "retention.retention_days must be at least 1".into(),
        ));
    }
    if retention.max_files == 0 {
        return Err(SettingsError::InvalidValue(
            "retention.max_files must be at least 1".into(),
        ));
    }
    if retention.max_size_mb.is_nan() || retention.max_size_mb <= 0.0 {
        return Err(SettingsError::InvalidValue(
            "retention.max_size_mb must be positive".into(),
        ));
    }
    if settings.query.timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "query.timeout_ms must be at least 1".into(),
        ));
    }
    if settings.registry.marker_dir.is_empty() || settings.registry.marker_dir.contains('/') {
        return Err(SettingsError::InvalidValue(format!(
            "registry.marker_dir must be a single path component, got '{}'",
            settings.registry.marker_dir
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FilterBackend;
    use assert_matches::assert_matches;

    #[test]
    fn settings_path_under_marker() {
        let path = settings_path_for_home(Path::new("/home/agent"));
        assert_eq!(path, PathBuf::from("/home/agent/.claude/hub.json"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|jail| {
            let path = jail.directory().join("nope.json");
            let settings = load_settings_from_path(&path).unwrap();
            assert_eq!(settings, HubSettings::default());
            Ok(())
        });
    }

    #[test]
    fn file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "hub.json",
                r#"{"query": {"backend": "native", "timeout_ms": 2500}}"#,
            )?;
            let path = jail.directory().join("hub.json");
            let settings = load_settings_from_path(&path).unwrap();
            assert_eq!(settings.query.backend, FilterBackend::Native);
            assert_eq!(settings.query.timeout_ms, 2500);
            assert_eq!(settings.retention.max_files, 100);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("hub.json", r#"{"retention": {"max_files": 20}}"#)?;
            jail.set_env("HUB_RETENTION__MAX_FILES", "30");
            jail.set_env("HUB_REGISTRY__AUTO_CLEANUP", "false");
            let path = jail.directory().join("hub.json");
            let settings = load_settings_from_path(&path).unwrap();
            assert_eq!(settings.retention.max_files, 30);
            assert!(!settings.registry.auto_cleanup);
            Ok(())
        });
    }

    #[test]
    fn invalid_json_is_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("hub.json", "{not json")?;
            let path = jail.directory().join("hub.json");
            let err = load_settings_from_path(&path).unwrap_err();
            assert_matches!(err, SettingsError::Figment(_));
            Ok(())
        });
    }

    #[test]
    fn zero_ceiling_rejected() {
        let mut settings = HubSettings::default();
        settings.retention.max_files = 0;
        assert_matches!(validate(&settings), Err(SettingsError::InvalidValue(msg)) if msg.contains("max_files"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut settings = HubSettings::default();
        settings.query.timeout_ms = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn nested_marker_rejected() {
        let mut settings = HubSettings::default();
        settings.registry.marker_dir = "a/b".into();
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn defaults_validate() {
        assert!(validate(&HubSettings::default()).is_ok());
    }
}
