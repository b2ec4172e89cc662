//! Logging initialization, shared by the `server` binary and by test
//! fixtures that want log output on failure.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a global `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `info` when the variable is unset. Safe to call more than once in tests
/// (later calls are ignored).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
