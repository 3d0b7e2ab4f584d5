//! Vulkan instance and the diagnostic layer.
//!
//! The Khronos validation layer is a diagnostic aid only. When it is
//! requested but not installed the instance is created without it and a
//! warning is logged. Its messages are forwarded to `tracing` at a level
//! matching their severity.
//!
//! # Example
//!
//! ```no_run
//! use clearframe_rhi::instance::Instance;
//!
//! # fn example() -> Result<(), clearframe_rhi::RhiError> {
//! // Normally supplied by the window system
//! let extensions = [ash::khr::surface::NAME.as_ptr()];
//! let instance = Instance::new(cfg!(debug_assertions), &extensions)?;
//! println!("validation: {}", instance.has_validation());
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use ash::{Entry, vk};
use tracing::{Level, debug, error, info, trace, warn};

use crate::error::RhiResult;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Requested API version. Dynamic rendering needs 1.3.
pub const API_VERSION: u32 = vk::API_VERSION_1_3;

/// Debug-utils loader together with the messenger it created.
struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    fn new(entry: &Entry, instance: &ash::Instance) -> RhiResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_tracing));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
        Ok(Self { loader, messenger })
    }

    /// Must run before the instance is destroyed.
    fn destroy(self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

/// Owned `VkInstance` plus the loader entry it was created from.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    diagnostics: Option<DebugMessenger>,
}

impl Instance {
    /// Loads Vulkan and creates an instance with `surface_extensions`.
    ///
    /// With `enable_validation`, the validation layer and a debug messenger
    /// are added if the layer is installed.
    ///
    /// # Errors
    ///
    /// Fails if the loader cannot be found, the instance cannot be created,
    /// or the messenger cannot be set up.
    pub fn new(enable_validation: bool, surface_extensions: &[*const c_char]) -> RhiResult<Self> {
        let entry = unsafe { Entry::load()? };

        let validation = enable_validation && {
            let layers = unsafe { entry.enumerate_instance_layer_properties()? };
            let installed = has_layer(&layers, VALIDATION_LAYER);
            if !installed {
                warn!("Validation layer requested but not installed; continuing without it");
            }
            installed
        };

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"clearframe")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"clearframe")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(API_VERSION);

        let mut extensions = surface_extensions.to_vec();
        let mut layers = Vec::new();
        if validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let diagnostics = if validation {
            match DebugMessenger::new(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        info!(
            extensions = extensions.len(),
            validation, "Vulkan instance created"
        );

        Ok(Self {
            entry,
            instance,
            diagnostics,
        })
    }

    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Whether the validation layer is active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.diagnostics.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if let Some(diagnostics) = self.diagnostics.take() {
            diagnostics.destroy();
        }
        unsafe { self.instance.destroy_instance(None) };
        debug!("Vulkan instance destroyed");
    }
}

fn has_layer(layers: &[vk::LayerProperties], name: &CStr) -> bool {
    layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|n| n == name))
}

fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

/// Debug messenger callback.
///
/// # Safety
///
/// The loader passes a callback data pointer that is null or valid for the
/// duration of the call.
unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = match unsafe { p_callback_data.as_ref() } {
        Some(data) if !data.p_message.is_null() => unsafe {
            CStr::from_ptr(data.p_message).to_string_lossy()
        },
        _ => Cow::Borrowed("(no message)"),
    };

    match severity_level(severity) {
        Level::ERROR => error!(?kind, "{}", message),
        Level::WARN => warn!(?kind, "{}", message),
        Level::DEBUG => debug!(?kind, "{}", message),
        _ => trace!(?kind, "{}", message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &CStr) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, &src) in props.layer_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn test_has_layer() {
        let layers = [layer(c"VK_LAYER_MESA_overlay"), layer(VALIDATION_LAYER)];
        assert!(has_layer(&layers, VALIDATION_LAYER));
        assert!(!has_layer(&layers[..1], VALIDATION_LAYER));
        assert!(!has_layer(&[], VALIDATION_LAYER));
    }

    #[test]
    fn test_severity_level() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        assert_eq!(severity_level(S::ERROR), Level::ERROR);
        assert_eq!(severity_level(S::WARNING), Level::WARN);
        assert_eq!(severity_level(S::INFO), Level::DEBUG);
        assert_eq!(severity_level(S::VERBOSE), Level::TRACE);
    }

    #[test]
    fn test_instance_without_validation() {
        // Needs a Vulkan loader; skipped when there is none
        let extensions = [ash::khr::surface::NAME.as_ptr()];
        match Instance::new(false, &extensions) {
            Ok(instance) => assert!(!instance.has_validation()),
            Err(e) => eprintln!("Skipping: Vulkan not available ({})", e),
        }
    }
}
