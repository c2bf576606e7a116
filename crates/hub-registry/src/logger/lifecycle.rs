//! Session lifecycle as a scoped resource.
//!
//! [`EventLogger::start`] writes `session.started` and hands back a
//! [`SessionGuard`]. The guard writes exactly one closing event: whichever of
//! [`SessionGuard::finish`], [`SessionGuard::fail`], or its `Drop` runs first.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::json;
use tracing::warn;

use hub_core::CorrelationId;

use super::EventLogger;
use crate::entry::{Fields, LogLevel};
use crate::errors::{RegistryError, Result};

/// Open session on a logger. Dereferences to the logger.
#[derive(Debug)]
pub struct SessionGuard<'a> {
    logger: &'a mut EventLogger,
    started: Instant,
    closed: bool,
}

impl EventLogger {
    /// Write `session.started` and return a guard that closes the session.
    pub fn start(&mut self) -> Result<SessionGuard<'_>> {
        let message = format!("Session {} started", self.session_id);
        let _ = self.emit(LogLevel::Info, "session.started", &message, None, Fields::new())?;
        Ok(SessionGuard {
            logger: self,
            started: Instant::now(),
            closed: false,
        })
    }

    /// Run `body` inside a session.
    ///
    /// `Ok` closes with `session.ended`, `Err` with `session.error`. A panic
    /// is recorded as `session.error` with `error_type = "panic"` and then
    /// resumed.
    pub fn run<T, E, F>(&mut self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut EventLogger) -> std::result::Result<T, E>,
        E: From<RegistryError> + fmt::Display,
    {
        let mut guard = self.start()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut *guard)));
        match outcome {
            Ok(Ok(value)) => {
                let _ = guard.finish()?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(write_err) = guard.fail(&err) {
                    warn!(error = %write_err, "failed to record failed session");
                }
                Err(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                if let Err(err) = guard.close_with_error("panic", &message) {
                    warn!(error = %err, "failed to record panicking session");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

impl SessionGuard<'_> {
    /// Milliseconds since `session.started` was written.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Close with `session.ended`.
    pub fn finish(mut self) -> Result<CorrelationId> {
        self.close_ok()
    }

    /// Close with `session.error`, recording the error's type and message.
    pub fn fail<E: fmt::Display + ?Sized>(mut self, err: &E) -> Result<CorrelationId> {
        self.close_with_error(short_type_name::<E>(), &err.to_string())
    }

    fn close_ok(&mut self) -> Result<CorrelationId> {
        self.closed = true;
        let mut fields = Fields::new();
        let _ = fields.insert("duration_ms".into(), json!(self.elapsed_ms()));
        let message = format!("Session {} ended", self.logger.session_id);
        self.logger
            .emit(LogLevel::Info, "session.ended", &message, None, fields)
    }

    fn close_with_error(&mut self, error_type: &str, error: &str) -> Result<CorrelationId> {
        self.closed = true;
        let mut fields = Fields::new();
        let _ = fields.insert("error_type".into(), json!(error_type));
        let _ = fields.insert("error".into(), json!(error));
        let _ = fields.insert("duration_ms".into(), json!(self.elapsed_ms()));
        let message = format!("Session ended with error: {error_type}");
        self.logger
            .emit(LogLevel::Error, "session.error", &message, None, fields)
    }
}

impl Deref for SessionGuard<'_> {
    type Target = EventLogger;

    fn deref(&self) -> &EventLogger {
        self.logger
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut EventLogger {
        self.logger
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let result = if std::thread::panicking() {
            self.close_with_error("panic", "thread panicked during session")
        } else {
            self.close_ok()
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to close session");
        }
    }
}

/// Last path segment of a type name, without generics.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
