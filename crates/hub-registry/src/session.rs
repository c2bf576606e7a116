//! Session identity shared by every logger in a process.
//!
//! A [`SessionContext`] is a cheap cloneable handle over one guarded slot.
//! Loggers built against the same context see the same session id: the first
//! one to ask generates it, and an explicit id given to any later logger
//! replaces it for everyone that follows.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use hub_core::SessionId;

/// Handle to the current session of a process (or of a test).
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    current: Arc<Mutex<Option<SessionId>>>,
}

static GLOBAL: OnceLock<SessionContext> = OnceLock::new();

impl SessionContext {
    /// A fresh, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide context used when a logger is built without one.
    pub fn global() -> &'static SessionContext {
        GLOBAL.get_or_init(SessionContext::new)
    }

    /// The current session, generating one on first use.
    pub fn get_or_create(&self) -> SessionId {
        let mut slot = self.current.lock();
        if let Some(id) = slot.as_ref() {
            return id.clone();
        }
        let id = SessionId::generate();
        debug!(session_id = %id, "generated session id");
        *slot = Some(id.clone());
        id
    }

    /// Make `id` the current session, replacing any previous one.
    pub fn adopt(&self, id: SessionId) {
        let mut slot = self.current.lock();
        if slot.as_ref() != Some(&id) {
            debug!(session_id = %id, "adopted session id");
        }
        *slot = Some(id);
    }

    /// The current session without creating one.
    pub fn current(&self) -> Option<SessionId> {
        self.current.lock().clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        assert!(SessionContext::new().current().is_none());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let ctx = SessionContext::new();
        let first = ctx.get_or_create();
        let second = ctx.get_or_create();
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("sess_"));
        assert_eq!(ctx.current(), Some(first));
    }

    #[test]
    fn adopt_overwrites() {
        let ctx = SessionContext::new();
        let _ = ctx.get_or_create();
        ctx.adopt(SessionId::from("sess_fixed_0001"));
        assert_eq!(ctx.get_or_create().as_str(), "sess_fixed_0001");
    }

    #[test]
    fn clones_share_the_slot() {
        let ctx = SessionContext::new();
        let other = ctx.clone();
        other.adopt(SessionId::from("sess_shared"));
        assert_eq!(ctx.current().unwrap().as_str(), "sess_shared");
    }

    #[test]
    fn separate_contexts_are_independent() {
        let a = SessionContext::new();
        let b = SessionContext::new();
        a.adopt(SessionId::from("sess_a"));
        assert!(b.current().is_none());
    }

    #[test]
    fn global_is_a_singleton() {
        let a = SessionContext::global();
        let b = SessionContext::global();
        assert!(std::ptr::eq(a, b));
    }
}
