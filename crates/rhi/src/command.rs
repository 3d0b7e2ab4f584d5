//! Per-frame command pools and the recorder the frame loop writes through.
//!
//! Every frame slot owns a [`CommandPool`] holding exactly one primary
//! buffer. The buffer is never reset on its own; resetting the pool recycles
//! it together with the pool memory, which is only legal once the GPU is done
//! with the slot's last submission.
//!
//! [`CommandRecorder`] does not own a buffer. It is rebound to the active
//! slot's buffer at the start of every frame, so one recorder serves all
//! slots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clearframe_rhi::device::Device;
//! use clearframe_rhi::command::{CommandPool, CommandRecorder};
//!
//! # fn example(device: Arc<Device>) -> Result<(), clearframe_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.queue_family())?;
//!
//! let recorder = CommandRecorder::bind(device, pool.primary());
//! recorder.begin()?;
//! recorder.end()?;
//!
//! // After the submission has completed:
//! pool.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::rendering::ColorScope;

/// Transient command pool owning a single primary command buffer.
///
/// Not thread-safe: record from one thread at a time.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    primary: vk::CommandBuffer,
}

impl CommandPool {
    /// Creates the pool and allocates its primary buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation or buffer allocation fails. A pool
    /// whose allocation failed is destroyed before returning.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let allocated = unsafe { device.handle().allocate_command_buffers(&alloc_info) }
            .map_err(RhiError::from)
            .and_then(|buffers| {
                buffers
                    .first()
                    .copied()
                    .ok_or(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
            });

        let primary = match allocated {
            Ok(buffer) => buffer,
            Err(e) => {
                unsafe { device.handle().destroy_command_pool(pool, None) };
                return Err(e);
            }
        };

        debug!(queue_family_index, "Frame command pool created");

        Ok(Self {
            device,
            pool,
            primary,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// The primary buffer allocated with the pool.
    #[inline]
    pub fn primary(&self) -> vk::CommandBuffer {
        self.primary
    }

    /// Returns the primary buffer to the initial state.
    ///
    /// The caller must guarantee the GPU has finished executing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
        }
        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Frees the primary buffer with the pool
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Frame command pool destroyed");
    }
}

/// Records into whichever command buffer it is bound to.
///
/// The owning [`CommandPool`] must outlive the recorder.
pub struct CommandRecorder {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandRecorder {
    #[inline]
    pub fn bind(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Starts a recording that is submitted exactly once.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is already recording or the device is lost.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// Closes the recording; the buffer is ready for submission.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is not recording or recording ran out of memory.
    pub fn end(&self) -> RhiResult<()> {
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// Opens a dynamic rendering scope on the scope's color view.
    pub fn begin_scope(&self, scope: &ColorScope) {
        let attachments = [scope.attachment()];
        let info = vk::RenderingInfo::default()
            .render_area(scope.render_area())
            .layer_count(1)
            .color_attachments(&attachments);

        unsafe {
            self.device
                .handle()
                .cmd_begin_rendering(self.buffer, &info);
        }
    }

    pub fn end_scope(&self) {
        unsafe {
            self.device.handle().cmd_end_rendering(self.buffer);
        }
    }

    /// Records a single image layout transition.
    pub fn image_barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        unsafe {
            self.device.handle().cmd_pipeline_barrier(
                self.buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(barrier),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandRecorder>();
    }

    #[test]
    fn test_command_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
    }
}
