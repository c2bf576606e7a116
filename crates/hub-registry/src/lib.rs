//! # hub-registry
//!
//! A filesystem session/event registry for cooperating agent processes that
//! share nothing but a directory tree.
//!
//! - [`context`]: decides between the global root and a project root
//! - [`session`]: the process-wide session identity
//! - [`logger`]: append-only JSON Lines emitters with correlation ids
//! - [`query`]: filter expressions over one or many log files
//! - [`retention`]: age, size, and count ceilings plus compaction
//!
//! ```no_run
//! use hub_registry::{Decision, EventLogger};
//!
//! let mut log = EventLogger::builder("spec:backend:auth01").build()?;
//! log.decision_made("Use JWT", Decision::because("Industry standard"))?;
//! # Ok::<(), hub_registry::RegistryError>(())
//! ```

#![deny(unsafe_code)]

pub mod context;
pub mod entry;
pub mod errors;
pub mod filter;
pub mod hooks;
pub mod logger;
pub mod query;
pub mod retention;
pub mod session;

pub use context::{ContextResolver, RegistryRoot, Scope, resolve_root};
pub use entry::{Fields, LogEntry, LogLevel};
pub use errors::{FilterError, RegistryError, Result};
pub use filter::{JqFilter, NativeFilter, RecordFilter};
pub use hooks::{HookRegistry, HookType};
pub use logger::{Decision, EventLogger, Handoff, LoggerBuilder, SessionGuard, Severity, Spawn};
pub use query::{Diagnostic, FileScan, QueryEngine, QueryResult};
pub use retention::{LogStats, RetentionPolicy};
pub use session::SessionContext;
