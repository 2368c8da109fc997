//! Development-time tracing for the crew CLI.
//!
//! Tracing is diagnostics only: it goes to stderr and is controlled by
//! `RUST_LOG`. Child process output streamed by `crew exec` is product output
//! and is written to stdout regardless of the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=crew=debug crew exec
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
