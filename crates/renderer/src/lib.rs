//! Double-buffered clear-and-present frame loop.
//!
//! This crate owns the per-frame lifecycle:
//! - [`SurfacePool`]: the rotating presentable surfaces and their states
//! - [`FrameSlotPool`]: one recording context per in-flight frame
//! - [`CompletionSignal`]: a monotonic counter the GPU catches up with
//! - [`FrameScheduler`]: the Acquire / Reclaim / Record / Submit / Present /
//!   Signal state machine
//!
//! The scheduler is generic over [`FrameBackend`]; [`vulkan::VulkanBackend`]
//! is the implementation used by the application.

pub mod backend;
pub mod completion;
mod error;
pub mod frame_slot;
pub mod scheduler;
pub mod surface;
pub mod vulkan;

pub use backend::{CommandArena, FrameBackend, FrameResources, SignalFence};
pub use completion::CompletionSignal;
pub use error::{FramePhase, RendererError, RendererResult};
pub use frame_slot::{FrameSlot, FrameSlotPool};
pub use scheduler::{FrameReport, FrameScheduler, RunSummary};
pub use surface::{SurfacePool, SurfaceState};

/// Number of surfaces, and therefore frames in flight.
pub const SURFACE_COUNT: usize = 2;
