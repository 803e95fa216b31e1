//! Process-wide logging setup shared by the binaries.

/// Initialize tracing from the environment (`LOG_FORMAT`, `RUST_LOG`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (format, filters).
pub mod tracing;

pub use tracing::{LogFormat, UnknownLogFormat, init_with};
