//! Core utilities for the frame loop.
//!
//! This crate provides foundational types and utilities used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::FrameConfig;
pub use error::{Error, Result};
pub use logging::{DEFAULT_LOG_FILTER, init_logging};
pub use timer::Timer;
