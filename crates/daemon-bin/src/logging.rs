//! Logging initialization for the daemon.
//!
//! Logs go to stderr only: stdout is reserved for the NDJSON output feed.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize the logging system for the daemon.
///
/// Log level comes from the `RUST_LOG` env var when set, otherwise the
/// provided default.
pub fn init_logging(level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(stderr_layer.with_filter(env_filter))
        .init();
}
