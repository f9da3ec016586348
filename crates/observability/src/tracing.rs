//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize JSON logs with timestamps, filtered by `RUST_LOG`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Like [`init`], with `default_filter` used when `RUST_LOG` is unset or invalid.
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_a_no_op() {
        init();
        init_with_filter("debug");
        ::tracing::info!(attempt = 2, "logging initialized");
    }
}
