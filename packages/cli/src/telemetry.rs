// ABOUTME: Tracing subscriber setup for the campus binary
// ABOUTME: RUST_LOG wins when set; otherwise falls back to the requested default level

use tracing_subscriber::EnvFilter;

/// Install a compact fmt subscriber. Safe to call more than once.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) keeps the existing subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
