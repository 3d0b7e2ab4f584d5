//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,clearframe=debug";

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Target and thread id annotations
///
/// Calling it more than once is harmless; later calls leave the first
/// subscriber in place.
///
/// # Example
/// ```
/// clearframe_core::init_logging();
/// tracing::info!("Frame loop starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
