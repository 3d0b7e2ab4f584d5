//! Vulkan implementation of the frame backend.
//!
//! # Acquire model
//!
//! The swapchain hands out images through `vkAcquireNextImageKHR`. To keep
//! the current index readable without side effects, the backend acquires the
//! first image while it is created and the next one straight after every
//! present, so [`FrameBackend::present`] already knows the next index.
//!
//! # Synchronization
//!
//! - Acquire semaphores rotate through a ring of `SURFACE_COUNT + 1`
//! - Render-finished semaphores are keyed per swapchain image
//! - The completion signal is a timeline semaphore
//!
//! Because a frame slot is only reset once the frame that used it
//! `SURFACE_COUNT` iterations ago has completed, every binary semaphore is
//! free of pending waits by the time it is signaled again.
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle
//! 2. Semaphores
//! 3. Swapchain (and its image views)
//! 4. Device, once the last `Arc` is released
//! 5. Window surface
//! 6. Instance

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, trace};

use clearframe_core::FrameConfig;
use clearframe_platform::{Window, WindowSurface};
use clearframe_rhi::command::{CommandPool, CommandRecorder};
use clearframe_rhi::device::Device;
use clearframe_rhi::instance::Instance;
use clearframe_rhi::physical_device::select_physical_device;
use clearframe_rhi::rendering::ColorScope;
use clearframe_rhi::swapchain::{Swapchain, SwapchainDesc, color_subresource_range};
use clearframe_rhi::sync::{Semaphore, TimelineSemaphore};
use clearframe_rhi::{RhiError, RhiResult};

use crate::SURFACE_COUNT;
use crate::backend::{CommandArena, FrameBackend, FrameResources, SignalFence};
use crate::error::{RendererError, RendererResult};
use crate::surface::SurfaceState;

/// A frame slot's command pool.
pub struct VulkanArena {
    pool: CommandPool,
}

impl VulkanArena {
    fn new(device: &Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            pool: CommandPool::new(device.clone(), device.queue_family())?,
        })
    }

    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.pool.primary()
    }
}

impl CommandArena for VulkanArena {
    fn reset(&mut self) -> RhiResult<()> {
        self.pool.reset()
    }
}

/// Timeline semaphore used as the completion signal.
pub struct VulkanFence {
    timeline: TimelineSemaphore,
}

impl SignalFence for VulkanFence {
    fn signal(&self, value: u64) -> RhiResult<()> {
        self.timeline.signal_on_queue(value)
    }

    fn wait_until(&self, value: u64) -> RhiResult<()> {
        self.timeline.wait(value, u64::MAX)
    }

    fn completed_value(&self) -> RhiResult<u64> {
        self.timeline.counter_value()
    }
}

/// Maps a surface state to the image layout that represents it.
pub fn layout_for(state: SurfaceState) -> vk::ImageLayout {
    match state {
        SurfaceState::Presentable => vk::ImageLayout::PRESENT_SRC_KHR,
        SurfaceState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }
}

/// Stages and barrier for a layout change of a swapchain image.
///
/// `first_use` replaces the old layout with `UNDEFINED`: freshly created
/// swapchain images have no defined contents and are cleared in full.
pub fn transition_barrier(
    image: vk::Image,
    before: SurfaceState,
    after: SurfaceState,
    first_use: bool,
) -> (
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
    vk::ImageMemoryBarrier<'static>,
) {
    let old_layout = if first_use {
        vk::ImageLayout::UNDEFINED
    } else {
        layout_for(before)
    };
    let new_layout = layout_for(after);

    let (src_stage, src_access, dst_stage, dst_access) = match after {
        SurfaceState::RenderTarget => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        SurfaceState::Presentable => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::AccessFlags::empty(),
        ),
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range());

    (src_stage, dst_stage, barrier)
}

/// Owns the Vulkan objects behind one window's frame loop.
pub struct VulkanBackend {
    acquire_semaphores: Vec<Semaphore>,
    render_finished: Vec<Semaphore>,
    swapchain: Swapchain,
    device: Arc<Device>,
    _surface: WindowSurface,
    _instance: Instance,

    /// Swapchain image that is current.
    current_image: usize,
    /// Acquire semaphore signaled for `current_image`.
    current_acquire: usize,
    /// Next free position in the acquire ring.
    acquire_cursor: usize,
    /// Images that have been transitioned at least once.
    initialized: [bool; SURFACE_COUNT],
    /// Recorder bound to the active slot's command buffer.
    recorder: Option<CommandRecorder>,
    /// View of the dynamic rendering scope that is open, if any.
    open_scope: Option<vk::ImageView>,
}

impl VulkanBackend {
    /// Brings up instance, device and swapchain for `window`.
    ///
    /// Returns the backend together with the surfaces, views, frame slot
    /// arenas and completion fence the scheduler takes over.
    ///
    /// # Errors
    ///
    /// Window handle failures are [`RendererError::Platform`], device-side
    /// failures are [`RendererError::Init`].
    pub fn new(
        window: &Window,
        config: &FrameConfig,
    ) -> RendererResult<(Self, FrameResources<Self>)> {
        let extensions = window.required_extensions()?;
        let instance =
            Instance::new(config.enable_validation, &extensions).map_err(RendererError::Init)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())
                .map_err(RendererError::Init)?;
        info!(
            "Using GPU '{}' with {} MiB device-local memory",
            physical_device.device_name(),
            physical_device.device_local_memory() / (1024 * 1024)
        );

        let device = Device::new(&instance, &physical_device).map_err(RendererError::Init)?;

        let desc = SwapchainDesc {
            width: config.width,
            height: config.height,
            image_count: SURFACE_COUNT as u32,
            vsync: config.sync_interval > 0,
        };
        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), &desc)
            .map_err(RendererError::Init)?;

        let surfaces = <[vk::Image; SURFACE_COUNT]>::try_from(swapchain.images())
            .map_err(|_| swapchain_count_error(swapchain.image_count()))?;
        let views = <[vk::ImageView; SURFACE_COUNT]>::try_from(swapchain.image_views())
            .map_err(|_| swapchain_count_error(swapchain.image_count()))?;

        let acquire_semaphores = (0..=SURFACE_COUNT)
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()
            .map_err(RendererError::Init)?;
        let render_finished = (0..SURFACE_COUNT)
            .map(|_| Semaphore::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()
            .map_err(RendererError::Init)?;

        let arenas: [VulkanArena; SURFACE_COUNT] = (0..SURFACE_COUNT)
            .map(|_| VulkanArena::new(&device))
            .collect::<RhiResult<Vec<_>>>()
            .map_err(RendererError::Init)?
            .try_into()
            .map_err(|arenas: Vec<VulkanArena>| swapchain_count_error(arenas.len()))?;

        let fence = VulkanFence {
            timeline: TimelineSemaphore::new(device.clone(), 0).map_err(RendererError::Init)?,
        };

        let (first, _) = swapchain
            .acquire_next_image(acquire_semaphores[0].handle())
            .map_err(|e| RendererError::Init(e.into()))?;

        info!(
            "Frame resources ready: {} surfaces, {} acquire semaphores, initial image {}",
            SURFACE_COUNT,
            acquire_semaphores.len(),
            first
        );

        let backend = Self {
            acquire_semaphores,
            render_finished,
            swapchain,
            device,
            _surface: surface,
            _instance: instance,
            current_image: first as usize,
            current_acquire: 0,
            acquire_cursor: 1,
            initialized: [false; SURFACE_COUNT],
            recorder: None,
            open_scope: None,
        };

        let resources = FrameResources {
            surfaces,
            views,
            arenas,
            fence,
            initial_index: first as usize,
        };

        Ok((backend, resources))
    }

    fn recorder(&self) -> RhiResult<&CommandRecorder> {
        self.recorder
            .as_ref()
            .ok_or(RhiError::NotRecording)
    }

    fn close_scope(&mut self) -> RhiResult<()> {
        if self.open_scope.take().is_some() {
            self.recorder()?.end_scope();
        }
        Ok(())
    }

    fn begin_scope(&mut self, scope: ColorScope) -> RhiResult<()> {
        self.recorder()?.begin_scope(&scope);
        self.open_scope = Some(scope.view);
        Ok(())
    }
}

fn swapchain_count_error(found: usize) -> RendererError {
    RendererError::Init(RhiError::SwapchainError(format!(
        "Expected {} swapchain images, found {}",
        SURFACE_COUNT, found
    )))
}

impl FrameBackend for VulkanBackend {
    type Surface = vk::Image;
    type View = vk::ImageView;
    type Arena = VulkanArena;
    type Fence = VulkanFence;

    fn begin_recording(&mut self, arena: &VulkanArena) -> RhiResult<()> {
        let recorder = CommandRecorder::bind(self.device.clone(), arena.command_buffer());
        recorder.begin()?;
        self.recorder = Some(recorder);
        self.open_scope = None;
        Ok(())
    }

    fn transition(
        &mut self,
        surface: vk::Image,
        before: SurfaceState,
        after: SurfaceState,
    ) -> RhiResult<()> {
        self.close_scope()?;

        let index = self
            .swapchain
            .images()
            .iter()
            .position(|&image| image == surface)
            .ok_or_else(|| {
                RhiError::SwapchainError(format!("Image {:?} is not a swapchain image", surface))
            })?;

        let first_use = !self.initialized[index];
        let (src_stage, dst_stage, barrier) =
            transition_barrier(surface, before, after, first_use);
        self.recorder()?
            .image_barrier(src_stage, dst_stage, &barrier);
        self.initialized[index] = true;

        trace!(index, ?before, ?after, first_use, "Recorded layout transition");
        Ok(())
    }

    fn clear(&mut self, view: vk::ImageView, color: [f32; 4]) -> RhiResult<()> {
        self.close_scope()?;
        self.begin_scope(ColorScope::clear(view, self.swapchain.extent(), color))
    }

    fn bind_render_target(&mut self, view: vk::ImageView) -> RhiResult<()> {
        // The clear already opened a scope on this view
        if self.open_scope == Some(view) {
            return Ok(());
        }
        self.close_scope()?;
        self.begin_scope(ColorScope::load(view, self.swapchain.extent()))
    }

    fn end_recording(&mut self) -> RhiResult<()> {
        self.close_scope()?;
        self.recorder()?.end()
    }

    fn submit(&mut self) -> RhiResult<()> {
        let recorder = self
            .recorder
            .take()
            .ok_or(RhiError::NotRecording)?;

        let wait_semaphores = [self.acquire_semaphores[self.current_acquire].handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished[self.current_image].handle()];
        let command_buffers = [recorder.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was fully recorded by end_recording, the acquire
        // semaphore has a pending signal from the last acquire, and the
        // render-finished semaphore's previous present wait was submitted
        // before this image was acquired again.
        unsafe { self.device.submit(&[submit_info], vk::Fence::null()) }
    }

    fn present(&mut self, sync_interval: u32) -> RhiResult<usize> {
        trace!(image = self.current_image, sync_interval, "Presenting");

        let suboptimal = self.swapchain.present(
            self.device.queue(),
            self.current_image as u32,
            self.render_finished[self.current_image].handle(),
        )?;
        if suboptimal {
            debug!("Swapchain reported suboptimal on present");
        }

        let acquire = self.acquire_cursor;
        let (next, _) = self
            .swapchain
            .acquire_next_image(self.acquire_semaphores[acquire].handle())?;

        self.current_acquire = acquire;
        self.acquire_cursor = (acquire + 1) % self.acquire_semaphores.len();
        self.current_image = next as usize;
        Ok(self.current_image)
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during backend drop: {:?}", e);
        }
        info!("Vulkan backend destroyed");
    }
}
