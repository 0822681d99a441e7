//! Tracing/log initialization.
//!
//! The pipeline emits `tracing` spans around stages and `log` records
//! from the leaf modules; `tracing-log` bridges the latter into the
//! subscriber so both end up in the same output.

use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber with an `info` default filter.
/// `RUST_LOG` overrides the default. Safe to call more than once.
pub fn init() {
    init_with_filter("info");
}

/// Initializes the global subscriber with the given default filter.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Both return an error when a global logger/subscriber is already
    // installed, which is fine for repeated calls from tests.
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        init_with_filter("debug");
    }
}
