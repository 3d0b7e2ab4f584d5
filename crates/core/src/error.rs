//! Error types shared across the workspace.

use thiserror::Error;

/// Errors raised outside the GPU layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or event loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// Rejected configuration values
    #[error("Config error: {0}")]
    Config(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the workspace's Error type.
pub type Result<T> = std::result::Result<T, Error>;
