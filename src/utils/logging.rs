//! Structured logging setup

use tracing_subscriber::EnvFilter;

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
