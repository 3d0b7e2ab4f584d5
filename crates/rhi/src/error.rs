//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error {code}: {0}", code = .0.as_raw())]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// A recording command was issued with no command buffer bound
    #[error("No command buffer is being recorded")]
    NotRecording,
}

impl RhiError {
    /// Returns the raw `VkResult` behind this error, if there is one.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            RhiError::VulkanError(result) => Some(result.as_raw()),
            _ => None,
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
