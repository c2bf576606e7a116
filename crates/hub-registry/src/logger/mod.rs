//! The event logger.
//!
//! An [`EventLogger`] binds one agent identity and one session to one log
//! file, `{root}/logs/{YYYY-MM-DD}/{session}.jsonl`, fixed at construction.
//! Every emitter funnels through [`EventLogger::emit`], which serializes the
//! entry into a single buffer and appends it with one write.

mod emitters;
mod lifecycle;

pub use emitters::{Decision, Handoff, Severity, Spawn};
pub use lifecycle::SessionGuard;

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use hub_core::constants::LOG_EXTENSION;
use hub_core::{AgentId, CorrelationId, SessionId};
use hub_settings::HubSettings;

use crate::context::{ContextResolver, RegistryRoot, Scope};
use crate::entry::{Fields, LogEntry, LogLevel};
use crate::errors::{RegistryError, Result};
use crate::hooks::HookRegistry;
use crate::retention::RetentionPolicy;
use crate::session::SessionContext;

/// Configures and constructs an [`EventLogger`].
///
/// A builder made with [`LoggerBuilder::default`] logs as
/// `registry.default_agent` from the settings in effect.
#[derive(Debug, Default)]
pub struct LoggerBuilder {
    agent_id: Option<AgentId>,
    session_id: Option<SessionId>,
    scope: Scope,
    cwd: Option<PathBuf>,
    home: Option<PathBuf>,
    context: Option<SessionContext>,
    settings: Option<HubSettings>,
    auto_cleanup: Option<bool>,
    hooks: Option<Arc<HookRegistry>>,
    now: Option<DateTime<Utc>>,
}

impl LoggerBuilder {
    fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Self::default()
        }
    }

    /// Use (and adopt process-wide) an explicit session id.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<SessionId>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Registry scope. Defaults to [`Scope::Auto`].
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Directory the project search starts from. Defaults to the process cwd.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Home directory holding the global root. Defaults to `$HOME`.
    #[must_use]
    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Session context to resolve against. Defaults to
    /// [`SessionContext::global`].
    #[must_use]
    pub fn context(mut self, context: SessionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Settings to use instead of the global ones.
    #[must_use]
    pub fn settings(mut self, settings: HubSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Override `registry.auto_cleanup`.
    #[must_use]
    pub fn auto_cleanup(mut self, enabled: bool) -> Self {
        self.auto_cleanup = Some(enabled);
        self
    }

    /// Hooks fired after matching events are written.
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Construction time used for the date partition. Defaults to now.
    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Resolve root and session, prune if configured, and create the date
    /// directory.
    pub fn build(self) -> Result<EventLogger> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => hub_settings::get_settings().clone(),
        };
        let cwd = match self.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir()
                .map_err(|e| RegistryError::io("reading current directory", ".", e))?,
        };
        let home = self.home.unwrap_or_else(hub_settings::home_dir);
        let agent_id = self
            .agent_id
            .unwrap_or_else(|| AgentId::from(settings.registry.default_agent.as_str()));
        let now = self.now.unwrap_or_else(Utc::now);

        let resolver = ContextResolver::new(settings.registry.marker_dir.clone());
        let root = resolver.resolve_scoped(self.scope, &cwd, &home)?;
        let logs_dir = root.logs_dir(&settings.registry.logs_dir);

        let context = self
            .context
            .unwrap_or_else(|| SessionContext::global().clone());
        let session_id = match self.session_id {
            Some(id) => {
                context.adopt(id.clone());
                id
            }
            None => context.get_or_create(),
        };

        if self.auto_cleanup.unwrap_or(settings.registry.auto_cleanup) {
            let policy = RetentionPolicy::from(&settings.retention);
            if let Err(err) = policy.prune(&logs_dir, now) {
                warn!(error = %err, logs_dir = %logs_dir.display(), "automatic log cleanup failed");
            }
        }

        let date_dir = logs_dir.join(now.format("%Y-%m-%d").to_string());
        fs::create_dir_all(&date_dir)
            .map_err(|e| RegistryError::io("creating log directory", &date_dir, e))?;
        let log_file = date_dir.join(format!("{session_id}.{LOG_EXTENSION}"));
        debug!(
            agent_id = %agent_id,
            session_id = %session_id,
            path = %log_file.display(),
            "event logger ready"
        );

        Ok(EventLogger {
            agent_id,
            session_id,
            root,
            logs_dir,
            log_file,
            sequence: 0,
            hooks: self.hooks,
        })
    }
}

/// Appends structured events for one agent in one session.
#[derive(Debug)]
pub struct EventLogger {
    agent_id: AgentId,
    session_id: SessionId,
    root: RegistryRoot,
    logs_dir: PathBuf,
    log_file: PathBuf,
    sequence: u64,
    hooks: Option<Arc<HookRegistry>>,
}

impl EventLogger {
    /// Start configuring a logger for `agent_id`.
    pub fn builder(agent_id: impl Into<AgentId>) -> LoggerBuilder {
        LoggerBuilder::new(agent_id.into())
    }

    /// Emitting agent.
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Session this logger writes to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Registry root chosen at construction.
    pub fn root(&self) -> &RegistryRoot {
        &self.root
    }

    /// The `logs/` directory under the root.
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// The file this logger appends to.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Number of correlation ids allocated so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Allocate the next correlation id.
    pub fn next_correlation_id(&mut self) -> CorrelationId {
        self.sequence += 1;
        CorrelationId::for_sequence(&self.session_id, self.sequence)
    }

    /// Append one entry and return its correlation id.
    ///
    /// A supplied `correlation_id` is reused verbatim and does not advance the
    /// counter. Extension `fields` that collide with required keys are dropped.
    #[instrument(skip_all, fields(evt = event_type, session_id = %self.session_id))]
    pub fn emit(
        &mut self,
        level: LogLevel,
        event_type: &str,
        message: &str,
        correlation_id: Option<CorrelationId>,
        fields: Fields,
    ) -> Result<CorrelationId> {
        let cid = match correlation_id {
            Some(cid) => cid,
            None => self.next_correlation_id(),
        };
        let entry = LogEntry::new(
            Utc::now(),
            level,
            cid.clone(),
            self.agent_id.clone(),
            event_type,
            message,
            fields,
        );
        let line = entry.to_line().map_err(|source| RegistryError::Serialize {
            event: event_type.to_string(),
            source,
        })?;
        self.append(line.as_bytes()).map_err(|source| RegistryError::Emit {
            event: event_type.to_string(),
            path: self.log_file.clone(),
            source,
        })?;
        if let Some(hooks) = &self.hooks {
            hooks.dispatch(&entry);
        }
        Ok(cid)
    }

    /// [`emit`](Self::emit) without a correlation id or extension fields.
    pub fn log(&mut self, level: LogLevel, event_type: &str, message: &str) -> Result<CorrelationId> {
        self.emit(level, event_type, message, None, Fields::new())
    }

    fn append(&self, buf: &[u8]) -> std::io::Result<()> {
        match open_append(&self.log_file) {
            Ok(mut file) => file.write_all(buf),
            // The date directory can vanish under a concurrent cleanup.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if let Some(parent) = self.log_file.parent() {
                    fs::create_dir_all(parent)?;
                }
                open_append(&self.log_file)?.write_all(buf)
            }
            Err(err) => Err(err),
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookType;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Fixture {
        _tmp: tempfile::TempDir,
        home: PathBuf,
        work: PathBuf,
        context: SessionContext,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let home = tmp.path().join("home");
        let work = tmp.path().join("work");
        fs::create_dir_all(&home).unwrap();
        fs::create_dir_all(&work).unwrap();
        Fixture {
            _tmp: tmp,
            home,
            work,
            context: SessionContext::new(),
        }
    }

    impl Fixture {
        fn builder(&self, agent: &str) -> LoggerBuilder {
            EventLogger::builder(agent)
                .home(&self.home)
                .cwd(&self.work)
                .context(self.context.clone())
                .settings(HubSettings::default())
                .auto_cleanup(false)
        }
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn file_path_follows_layout() {
        let fx = fixture();
        let log = fx.builder("orch:main").build().unwrap();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let expected = fx
            .home
            .join(".claude/logs")
            .join(today)
            .join(format!("{}.jsonl", log.session_id()));
        assert_eq!(log.log_file(), expected);
        assert!(log.log_file().parent().unwrap().is_dir());
        assert!(!log.root().is_project());
    }

    #[test]
    fn correlation_ids_increase_from_one() {
        let fx = fixture();
        let mut log = fx.builder("orch:main").build().unwrap();
        let session = log.session_id().clone();
        for n in 1..=3u64 {
            let cid = log.log(LogLevel::Info, "task.started", "x").unwrap();
            assert_eq!(cid.as_str(), format!("corr_{session}_{n:03}"));
        }
        assert_eq!(log.sequence(), 3);
    }

    #[test]
    fn explicit_correlation_id_does_not_advance() {
        let fx = fixture();
        let mut log = fx.builder("orch:main").build().unwrap();
        let first = log.log(LogLevel::Info, "a", "x").unwrap();
        let reused = log
            .emit(LogLevel::Info, "b", "y", Some(first.clone()), Fields::new())
            .unwrap();
        assert_eq!(reused, first);
        let next = log.log(LogLevel::Info, "c", "z").unwrap();
        assert_eq!(next.sequence(), Some(2));
    }

    #[test]
    fn required_keys_win_over_fields() {
        let fx = fixture();
        let mut log = fx.builder("orch:main").build().unwrap();
        let mut fields = Fields::new();
        let _ = fields.insert("aid".into(), json!("forged"));
        let _ = fields.insert("note".into(), json!("kept"));
        let _ = log
            .emit(LogLevel::Info, "task.started", "x", None, fields)
            .unwrap();
        let lines = read_lines(log.log_file());
        assert_eq!(lines[0]["aid"], "orch:main");
        assert_eq!(lines[0]["note"], "kept");
    }

    #[test]
    fn long_messages_are_truncated() {
        let fx = fixture();
        let mut log = fx.builder("orch:main").build().unwrap();
        let _ = log.log(LogLevel::Info, "task.started", &"m".repeat(150)).unwrap();
        let lines = read_lines(log.log_file());
        let msg = lines[0]["msg"].as_str().unwrap();
        assert_eq!(msg.chars().count(), 100);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn second_logger_inherits_explicit_session() {
        let fx = fixture();
        let a = fx.builder("orch:main").session_id("sess_fixed_0001").build().unwrap();
        let b = fx.builder("verif:001").build().unwrap();
        assert_eq!(a.session_id(), b.session_id());
        assert!(b.log_file().to_string_lossy().contains("sess_fixed_0001"));
    }

    #[test]
    fn loggers_keep_independent_counters() {
        let fx = fixture();
        let mut a = fx.builder("orch:main").build().unwrap();
        let mut b = fx.builder("verif:001").build().unwrap();
        let _ = a.log(LogLevel::Info, "x", "x").unwrap();
        let cid = b.log(LogLevel::Info, "x", "x").unwrap();
        assert_eq!(cid.sequence(), Some(1));
        assert_eq!(a.log_file(), b.log_file());
    }

    #[test]
    fn project_scope_without_marker_fails() {
        let fx = fixture();
        let err = fx.builder("orch:main").scope(Scope::Project).build().unwrap_err();
        assert_matches!(err, RegistryError::NoProjectContext { .. });
    }

    #[test]
    fn project_marker_redirects_logs() {
        let fx = fixture();
        fs::create_dir_all(fx.work.join(".claude")).unwrap();
        let log = fx.builder("orch:main").build().unwrap();
        assert!(log.log_file().starts_with(fx.work.join(".claude/logs")));
    }

    #[test]
    fn append_recreates_removed_date_dir() {
        let fx = fixture();
        let mut log = fx.builder("orch:main").build().unwrap();
        fs::remove_dir(log.log_file().parent().unwrap()).unwrap();
        let _ = log.log(LogLevel::Info, "task.started", "x").unwrap();
        assert_eq!(read_lines(log.log_file()).len(), 1);
    }

    #[test]
    fn emit_error_names_event_and_file() {
        let fx = fixture();
        let mut log = fx.builder("orch:main").build().unwrap();
        fs::create_dir_all(log.log_file()).unwrap();
        let err = log.log(LogLevel::Info, "task.started", "x").unwrap_err();
        assert_matches!(err, RegistryError::Emit { ref event, .. } if event == "task.started");
    }

    #[test]
    fn hooks_fire_after_append() {
        let fx = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        let sink = Arc::clone(&seen);
        hooks.register(HookType::PreTool, move |e: &LogEntry| {
            sink.lock().push(e.cid.to_string());
        });
        let mut log = fx.builder("orch:main").hooks(Arc::new(hooks)).build().unwrap();
        let cid = log.pre_tool("Read", "src/main.rs").unwrap();
        let _ = log.log(LogLevel::Info, "task.started", "x").unwrap();
        assert_eq!(*seen.lock(), vec![cid.to_string()]);
    }

    #[test]
    fn default_builder_uses_configured_agent() {
        let fx = fixture();
        let mut settings = HubSettings::default();
        let base = LoggerBuilder::default()
            .home(&fx.home)
            .cwd(&fx.work)
            .context(fx.context.clone())
            .auto_cleanup(false);

        let log = base.settings(settings.clone()).build().unwrap();
        assert_eq!(log.agent_id().as_str(), "orch:default");

        settings.registry.default_agent = "orch:nightly".into();
        let mut log = LoggerBuilder::default()
            .home(&fx.home)
            .cwd(&fx.work)
            .context(fx.context.clone())
            .settings(settings)
            .auto_cleanup(false)
            .build()
            .unwrap();
        let _ = log.log(LogLevel::Info, "task.started", "Nightly").unwrap();
        let line = fs::read_to_string(log.log_file()).unwrap();
        assert!(line.contains("\"aid\":\"orch:nightly\""));
    }

    #[test]
    fn auto_cleanup_prunes_expired_partitions() {
        let fx = fixture();
        let stale = fx.home.join(".claude/logs/2000-01-01");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("sess_old.jsonl"), "{}\n").unwrap();
        let _log = fx.builder("orch:main").auto_cleanup(true).build().unwrap();
        assert!(!stale.exists());
    }
}
