//! Diagnostics via `tracing`
//!
//! Everything goes to stderr so stdout stays free for the JSON summary.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides `level`.
///
/// A second call is tolerated so tests and embedders can call it freely.
pub fn init(level: Level) -> Result<(), String> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .map_err(|e| format!("Failed to initialize tracing: {}", e))
}
