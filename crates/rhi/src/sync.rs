//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - binary semaphore, GPU-to-GPU ordering between acquire,
//!   submission and presentation
//! - [`TimelineSemaphore`] - a monotonically increasing 64-bit counter the GPU
//!   advances and the host can wait on
//!
//! # Overview
//!
//! A timeline semaphore carries a `u64` value. Queue submissions can signal it
//! to a new, larger value once all work submitted before the signal has
//! completed; the host can query the current value or block until it reaches
//! a target. This makes it a direct fit for "has the GPU finished the frame
//! that was submitted N frames ago?".
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clearframe_rhi::device::Device;
//! use clearframe_rhi::sync::TimelineSemaphore;
//!
//! # fn example(device: Arc<Device>) -> Result<(), clearframe_rhi::RhiError> {
//! let timeline = TimelineSemaphore::new(device, 0)?;
//!
//! // After submitting a frame, signal value 1 on the queue
//! timeline.signal_on_queue(1)?;
//!
//! // Before reusing that frame's resources, block until the GPU caught up
//! timeline.wait(1, u64::MAX)?;
//! assert!(timeline.counter_value()? >= 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan binary semaphore wrapper.
///
/// Used for GPU-to-GPU ordering:
/// - Acquire semaphore: signaled when a swapchain image is ready
/// - Render finished semaphore: signaled when the frame's commands complete
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

/// Vulkan timeline semaphore wrapper.
///
/// Signals are enqueued on the device queue, so the value is only reached once
/// every command submitted to that queue before the signal has finished.
pub struct TimelineSemaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl TimelineSemaphore {
    /// Creates a timeline semaphore starting at `initial_value`.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>, initial_value: u64) -> RhiResult<Self> {
        let mut type_info = timeline_type_info(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created timeline semaphore (initial value {})", initial_value);

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Enqueues a GPU-side signal that sets the counter to `value`.
    ///
    /// `value` must be greater than every value previously signaled.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue submission fails.
    pub fn signal_on_queue(&self, value: u64) -> RhiResult<()> {
        let signal_values = [value];
        let signal_semaphores = [self.semaphore];

        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        unsafe { self.device.submit(&[submit_info], vk::Fence::null()) }
    }

    /// Blocks until the counter reaches at least `value`.
    ///
    /// # Arguments
    ///
    /// * `value` - Target counter value
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for infinite wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails or times out (`vk::Result::TIMEOUT`).
    pub fn wait(&self, value: u64, timeout: u64) -> Result<(), RhiError> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe { self.device.handle().wait_semaphores(&wait_info, timeout)? };
        Ok(())
    }

    /// Returns the counter value the GPU has reached so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails (e.g. device lost).
    pub fn counter_value(&self) -> RhiResult<u64> {
        let value = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)?
        };
        Ok(value)
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed timeline semaphore");
    }
}

fn timeline_type_info(initial_value: u64) -> vk::SemaphoreTypeCreateInfo<'static> {
    vk::SemaphoreTypeCreateInfo::default()
        .semaphore_type(vk::SemaphoreType::TIMELINE)
        .initial_value(initial_value)
}
