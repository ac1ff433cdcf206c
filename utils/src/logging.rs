//! Structured logging initialization via `tracing`.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with sensible defaults.
///
/// Respects the `RUST_LOG` environment variable for filtering. Calling it
/// again (for example from several tests) is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
