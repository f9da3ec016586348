//! Shared tracing setup for processes embedding the conversion workflow.

/// Initialize process-wide structured logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;
