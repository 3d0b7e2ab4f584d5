//! Vulkan logical device and queue management.
//!
//! The frame loop needs exactly one queue: it records, submits, signals and
//! presents on the same queue, so the queue family picked during adapter
//! selection must support both graphics and presentation.
//!
//! # Example
//!
//! ```no_run
//! use clearframe_rhi::instance::Instance;
//! use clearframe_rhi::physical_device::select_physical_device;
//! use clearframe_rhi::device::Device;
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let adapter = select_physical_device(instance.handle(), surface, &surface_loader)
//!     .expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &adapter).expect("Failed to create logical device");
//! let queue = device.queue();
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::PhysicalDeviceInfo;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Shared through `Arc` by every object that must destroy its handle through
/// the device.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// The single submission and presentation queue.
    queue: vk::Queue,
    /// Queue family of `queue`.
    queue_family: u32,
}

impl Device {
    /// Creates a new logical device with one queue.
    ///
    /// Enabled features:
    /// - Vulkan 1.2 timeline semaphores (the completion signal)
    /// - Vulkan 1.3 dynamic rendering (binding the render target)
    ///
    /// # Errors
    ///
    /// Returns an error if device creation fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_family = physical_device_info.queue_family;
        let queue_priorities = [1.0f32];

        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&queue_priorities)];

        let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        debug!("Queue retrieved from family {}", queue_family);

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            queue,
            queue_family,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the submission and presentation queue.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Returns the queue family index of [`queue`](Self::queue).
    #[inline]
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits work to the queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and fully recorded
    /// - Every semaphore waited on has a signal pending or completed
    /// - The fence (if not null) is unsignaled and not in use
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    pub unsafe fn submit(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device.queue_submit(self.queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send + Sync; the remaining fields are plain handles.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
