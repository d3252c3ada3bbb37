//! Tracing/logging setup shared by everything embedding the engine.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::init;
