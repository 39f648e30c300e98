//! Logging setup shared by the server and client binaries.
//!
//! `RUST_LOG` wins over the configured level when it is set.

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
