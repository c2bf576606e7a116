//! Filter evaluation over decoded records.
//!
//! The query engine hands a file's records to a [`RecordFilter`] together with
//! a jq-style expression. [`JqFilter`] delegates to the real `jq`;
//! [`NativeFilter`] covers the common predicate subset without it.

mod jq;
mod native;

pub use jq::{JQ_REMEDY, JqFilter};
pub use native::{Expr, NativeFilter, Program};

use std::time::Duration;

use serde_json::Value;

use hub_settings::{FilterBackend, QuerySettings};

use crate::errors::FilterError;

/// Applies an expression to a batch of records, preserving order.
pub trait RecordFilter: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Evaluate `expression` against `records`.
    fn filter(&self, records: Vec<Value>, expression: &str) -> Result<Vec<Value>, FilterError>;
}

/// The backend `settings` selects.
pub fn from_settings(settings: &QuerySettings) -> Box<dyn RecordFilter> {
    match settings.backend {
        FilterBackend::Jq => Box::new(JqFilter::new(
            settings.jq_binary.clone(),
            Duration::from_millis(settings.timeout_ms),
        )),
        FilterBackend::Native => Box::new(NativeFilter),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_pick_backend() {
        let mut settings = QuerySettings::default();
        assert_eq!(from_settings(&settings).name(), "jq");
        settings.backend = FilterBackend::Native;
        assert_eq!(from_settings(&settings).name(), "native");
    }
}
