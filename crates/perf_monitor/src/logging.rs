//! Diagnostic output setup.
//!
//! The monitor writes every diagnostic as a `tracing` event under the
//! [`TARGET`] target. Applications that already install a subscriber need
//! nothing from this module.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing target used by all monitor diagnostics.
pub const TARGET: &str = "perf_monitor";

/// Filter applied when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "perf_monitor=debug";

/// Install a formatted stderr subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_logging() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_init_logging_installs_once() {
        init_logging();
        assert!(!init_logging());
        tracing::debug!(target: TARGET, "logging installed");
    }
}
