//! Logging initialization for hosts.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `tracing` subscriber with env-filter support.
///
/// The engine itself only emits events; hosts (or test binaries) decide
/// whether and how to subscribe. Honors `RUST_LOG`, defaulting to
/// `loreguard_engine=debug`.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loreguard_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
