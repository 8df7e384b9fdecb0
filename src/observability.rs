//! Tracing initialization. Live counters live in [`crate::stats`] — this
//! module is just process wiring.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber, honoring `RUST_LOG` and
/// falling back to `info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
