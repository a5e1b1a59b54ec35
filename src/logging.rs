//! Logging setup for the binaries
//!
//! Verbosity comes from `RUST_LOG` (default `info`). Logs go to stderr so
//! stdout only carries event output.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Call once, first thing in `main`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
