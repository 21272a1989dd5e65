//! Tracing setup for the client core.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate only.
/// Safe to call once per process; the embedding application owns the
/// decision of when (and whether) to call it.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("swwap_client=debug")),
        )
        .init();
}
