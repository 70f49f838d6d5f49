//! Process-wide tracing/logging setup shared by the UCAEP binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
