//! Log setup shared by the binaries.
//!
//! Stdout carries records, so every log line goes to stderr.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `verbose` wins over `RUST_LOG`: 0 defers to
/// `RUST_LOG` (or `info` without it), 1 is `debug`, 2 and up is `trace`.
pub fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}
