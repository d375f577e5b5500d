//! Logging setup.
//!
//! Library code only emits `tracing` events; binaries decide where they go.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "listwise=info";

/// Install a stderr subscriber honoring `RUST_LOG`, falling back to
/// `listwise=info`. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Same as [`init_tracing`] with `listwise=debug` unless `RUST_LOG` is set.
pub fn init_tracing_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("listwise=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
