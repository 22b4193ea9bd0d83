//! Tracing setup for binaries and tests embedding the kernel.
//!
//! The library crates only emit events; installing a subscriber is left to
//! the application, through this module or its own.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default(LevelFilter::INFO)
}

/// Like [`init`] with a different default level.
pub fn init_with_default(level: LevelFilter) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
