//! Diagnostic logging via `tracing`.
//!
//! The registry itself never prints; it reports through `tracing` macros and
//! returned diagnostics. Binaries install a subscriber with
//! [`init_subscriber`] so those reports reach stderr, keeping stdout free for
//! query output.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with stderr output only.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Minimum log level to display, e.g. `"warn"`.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}
