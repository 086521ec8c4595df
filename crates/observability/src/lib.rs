//! Tracing/logging setup shared by every process embedding the allocator.

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    self::tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{init_with, LogFormat, ParseLogFormatError};
