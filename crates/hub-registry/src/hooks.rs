//! Callbacks fired after lifecycle and tool events are written.
//!
//! A [`HookRegistry`] maps each [`HookType`] to the callbacks registered for
//! it, in registration order. A logger holding a registry triggers the
//! matching callbacks with the entry it just appended; a failed append fires
//! nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::entry::LogEntry;

/// Points in a session at which hooks fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookType {
    /// After `hook.pre_tool` is written.
    PreTool,
    /// After `hook.post_tool` is written.
    PostTool,
    /// After `session.started` is written.
    SessionStart,
    /// After `session.ended` or `session.error` is written.
    SessionEnd,
    /// After `context.compacted` is written.
    ContextCompact,
}

impl HookType {
    /// The hook that an event type triggers, if any.
    #[must_use]
    pub fn for_event(evt: &str) -> Option<Self> {
        match evt {
            "hook.pre_tool" => Some(Self::PreTool),
            "hook.post_tool" => Some(Self::PostTool),
            "session.started" => Some(Self::SessionStart),
            "session.ended" | "session.error" => Some(Self::SessionEnd),
            "context.compacted" => Some(Self::ContextCompact),
            _ => None,
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreTool => "pre_tool",
            Self::PostTool => "post_tool",
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::ContextCompact => "context_compact",
        };
        f.write_str(name)
    }
}

/// A registered callback.
pub type HookCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Callbacks keyed by [`HookType`].
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<HookType, Vec<HookCallback>>,
}

impl HookRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the callbacks for `hook_type`.
    pub fn register<F>(&mut self, hook_type: HookType, callback: F)
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        debug!(%hook_type, "registering hook");
        self.hooks
            .entry(hook_type)
            .or_default()
            .push(Arc::new(callback));
    }

    /// Invoke every callback for `hook_type` with `entry`.
    pub fn trigger(&self, hook_type: HookType, entry: &LogEntry) {
        if let Some(callbacks) = self.hooks.get(&hook_type) {
            for callback in callbacks {
                callback(entry);
            }
        }
    }

    /// Fire the hook matching `entry.evt`, if any.
    pub fn dispatch(&self, entry: &LogEntry) {
        if let Some(hook_type) = HookType::for_event(&entry.evt) {
            self.trigger(hook_type, entry);
        }
    }

    /// Total number of registered callbacks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    /// Remove every callback.
    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hook_count", &self.count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Fields, LogLevel};
    use chrono::Utc;
    use parking_lot::Mutex;

    fn entry(evt: &str) -> LogEntry {
        LogEntry::new(
            Utc::now(),
            LogLevel::Debug,
            "corr_s_001".into(),
            "orch:main".into(),
            evt,
            "m",
            Fields::new(),
        )
    }

    #[test]
    fn event_mapping() {
        assert_eq!(HookType::for_event("hook.pre_tool"), Some(HookType::PreTool));
        assert_eq!(HookType::for_event("session.error"), Some(HookType::SessionEnd));
        assert_eq!(HookType::for_event("decision.made"), None);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.register(HookType::PreTool, move |e: &LogEntry| {
                seen.lock().push(format!("{tag}:{}", e.evt));
            });
        }
        registry.dispatch(&entry("hook.pre_tool"));
        registry.dispatch(&entry("task.started"));
        assert_eq!(
            *seen.lock(),
            vec!["first:hook.pre_tool".to_string(), "second:hook.pre_tool".to_string()]
        );
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn clear_removes_all() {
        let mut registry = HookRegistry::new();
        registry.register(HookType::SessionEnd, |_: &LogEntry| {});
        registry.clear();
        assert_eq!(registry.count(), 0);
        assert!(format!("{registry:?}").contains("hook_count: 0"));
    }
}
