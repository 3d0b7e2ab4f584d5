//! Fixed-size presentation chain.
//!
//! The window it presents to cannot be resized, so a [`Swapchain`] is created
//! once with an exact image count and lives until shutdown. There is no
//! recreation path: an out-of-date swapchain surfaces as an error.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clearframe_rhi::instance::Instance;
//! use clearframe_rhi::device::Device;
//! use clearframe_rhi::swapchain::{Swapchain, SwapchainDesc};
//! use clearframe_rhi::vk;
//!
//! # fn example(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR,
//! #            acquire: vk::Semaphore, finished: vk::Semaphore)
//! #     -> Result<(), clearframe_rhi::RhiError> {
//! let swapchain = Swapchain::new(instance, device.clone(), surface, &SwapchainDesc::default())?;
//!
//! let (index, _suboptimal) = swapchain.acquire_next_image(acquire)?;
//! // ... render into swapchain.images()[index as usize] ...
//! swapchain.present(device.queue(), index, finished)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Formats in order of preference. Anything else is a last resort.
const PREFERRED_FORMATS: [vk::Format; 2] = [vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_UNORM];

/// Requested swapchain shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    /// Exact number of images; creation fails if the surface disagrees.
    pub image_count: u32,
    /// Present on vertical blank (FIFO).
    pub vsync: bool,
}

impl Default for SwapchainDesc {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            image_count: 2,
            vsync: true,
        }
    }
}

/// What a surface offers to a physical device.
struct SurfaceSupport {
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: loader.get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            })
        }
    }
}

/// Owns a `VkSwapchainKHR` and one view per image.
///
/// The images belong to the swapchain and are released with it.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates a swapchain of exactly `desc.image_count` color-attachment
    /// images with opaque composition.
    ///
    /// # Errors
    ///
    /// Fails if the surface cannot be queried, offers no format, cannot hold
    /// the requested image count, or if creation of the swapchain or its
    /// views fails. Nothing is leaked on failure.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        desc: &SwapchainDesc,
    ) -> RhiResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let support = SurfaceSupport::query(device.physical_device(), surface, &surface_loader)?;

        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            RhiError::SwapchainError("Surface reports no formats".to_string())
        })?;
        let present_mode = choose_present_mode(&support.present_modes, desc.vsync);
        let extent = choose_extent(&support.capabilities, desc.width, desc.height);
        check_image_count(&support.capabilities, desc.image_count)?;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(desc.image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };

        let created = unsafe { loader.get_swapchain_images(swapchain) }
            .map_err(RhiError::from)
            .and_then(|images| {
                // min_image_count is only a lower bound for the driver
                if images.len() != desc.image_count as usize {
                    return Err(RhiError::SwapchainError(format!(
                        "Requested {} swapchain images, driver created {}",
                        desc.image_count,
                        images.len()
                    )));
                }
                let views = create_image_views(&device, &images, surface_format.format)?;
                Ok((images, views))
            });

        let (images, image_views) = match created {
            Ok(created) => created,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        info!(
            width = extent.width,
            height = extent.height,
            format = ?surface_format.format,
            ?present_mode,
            images = images.len(),
            "Swapchain created"
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            extent,
        })
    }

    /// Requests the next image; `semaphore` is signaled once it is usable.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Queues `image_index` for display after `wait_semaphore` is signaled.
    ///
    /// Returns whether the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Views in image order: `image_views()[i]` views `images()[i]`.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!("Swapchain destroyed");
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = PREFERRED_FORMATS
        .iter()
        .find_map(|&wanted| formats.iter().find(|f| f.format == wanted));

    match preferred {
        Some(&format) => Some(format),
        None => {
            let first = formats.first().copied();
            if let Some(format) = first {
                warn!("No preferred surface format, using {:?}", format.format);
            }
            first
        }
    }
}

/// FIFO is the vsync mode and the only one every driver must offer.
fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::IMMEDIATE) {
        vk::PresentModeKHR::IMMEDIATE
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Uses the surface's own extent when it has one, else clamps the request.
fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

fn check_image_count(caps: &vk::SurfaceCapabilitiesKHR, requested: u32) -> RhiResult<()> {
    // max_image_count of 0 means no upper bound
    let fits_max = caps.max_image_count == 0 || requested <= caps.max_image_count;
    if requested < caps.min_image_count || !fits_max {
        return Err(RhiError::SwapchainError(format!(
            "Surface supports {}..={} images, {} required",
            caps.min_image_count,
            if caps.max_image_count == 0 {
                "unbounded".to_string()
            } else {
                caps.max_image_count.to_string()
            },
            requested
        )));
    }
    Ok(())
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(color_subresource_range());

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => views.push(view),
            Err(e) => {
                for &view in &views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(e.into());
            }
        }
    }

    Ok(views)
}

/// The single mip level and array layer of a swapchain image.
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .level_count(1)
        .layer_count(1)
}
