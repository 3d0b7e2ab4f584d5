//! The fixed-size window and the Vulkan surface presented to it.

use std::ffi::{CStr, c_char};

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use clearframe_core::{Error, Result};

/// Owned `VkSurfaceKHR` for a [`Window`].
///
/// Must be dropped before both the window and the Vulkan instance it was
/// created from.
pub struct WindowSurface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl WindowSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// `VK_KHR_surface` entry points, used for capability queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        // SAFETY: created from the instance `loader` was built for and
        // destroyed only here.
        unsafe { self.loader.destroy_surface(self.handle, None) };
        debug!("Window surface destroyed");
    }
}

/// A non-resizable window sized in physical pixels.
pub struct Window {
    window: WinitWindow,
}

impl Window {
    /// Opens the window on `event_loop`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the window system refuses the window.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(format!("Failed to create window: {}", e)))?;

        info!(title, width, height, "Window created");
        Ok(Self { window })
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle)> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("No display handle: {}", e)))?;
        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("No window handle: {}", e)))?;
        Ok((display.as_raw(), window.as_raw()))
    }

    /// Instance extensions the window system needs to present to this window.
    ///
    /// The pointers reference static strings owned by `ash-window`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] for display servers Vulkan cannot present to.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let (display, _) = self.raw_handles()?;
        let extensions = ash_window::enumerate_required_extensions(display)
            .map_err(|e| Error::Window(format!("Unsupported display for Vulkan: {}", e)))?;

        for &name in extensions {
            // SAFETY: ash-window returns static, NUL-terminated names
            debug!("Surface extension {:?}", unsafe { CStr::from_ptr(name) });
        }

        Ok(extensions.to_vec())
    }

    /// Creates the surface the swapchain presents to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] carrying the Vulkan status if creation fails.
    pub fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<WindowSurface> {
        let (display, window) = self.raw_handles()?;

        // SAFETY: both handles come from a live window that outlives the
        // returned surface.
        let handle = unsafe { ash_window::create_surface(entry, instance, display, window, None) }
            .map_err(|e| {
                Error::Window(format!(
                    "Failed to create Vulkan surface (status {}): {}",
                    e.as_raw(),
                    e
                ))
            })?;

        debug!("Window surface created");
        Ok(WindowSurface {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }
}
