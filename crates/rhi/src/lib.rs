//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a thin, owned abstraction over Vulkan using the `ash`
//! crate, covering exactly what a double-buffered clear-and-present loop needs:
//! - Instance and device creation
//! - Adapter selection
//! - Swapchain management
//! - Command pool and command buffer recording
//! - Dynamic rendering helpers
//! - Synchronization primitives (binary and timeline semaphores)

mod error;

pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod rendering;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
