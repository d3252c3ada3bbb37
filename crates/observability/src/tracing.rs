//! Tracing/logging initialization.
//!
//! The engine itself only emits `tracing` events (degrade-to-zero
//! breadcrumbs at debug, batch reports at info); hosts that want them on
//! stdout call [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops). Filtering is
/// controlled through `RUST_LOG`; without it, recalculation and backfill
/// reports are visible and per-node noise is not.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("costchain=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
