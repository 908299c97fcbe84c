//! Tracing/logging initialization.
//!
//! The guarded service path annotates every privileged mutation with
//! `#[instrument]` spans (caller, role, tenant); this module decides where
//! those spans go. JSON lines to stdout by default, filterable via `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops), which keeps it
/// usable from both binaries and test harnesses.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
