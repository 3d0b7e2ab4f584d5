//! Physical device (adapter) selection.
//!
//! The selection process:
//! 1. Enumerate all available GPUs
//! 2. Drop GPUs without a queue family that can both render and present to the
//!    window surface, or without Vulkan 1.3 / timeline semaphore support
//! 3. Pick the remaining GPU with the largest dedicated memory. Discrete and
//!    virtual GPUs rank ahead of integrated and CPU devices, whose
//!    device-local heaps are usually carved out of system RAM; within a rank
//!    the most device-local memory wins, and on a tie the first enumerated
//!    GPU wins
//!
//! # Example
//!
//! ```no_run
//! use clearframe_rhi::instance::Instance;
//! use clearframe_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let adapter = select_physical_device(instance.handle(), surface, &surface_loader)
//!     .expect("Failed to select physical device");
//!
//! println!("Picked {}", adapter.device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Information about a physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family used for both command submission and presentation.
    pub queue_family: u32,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        device_local_memory(&self.memory_properties)
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("device_local_memory", &self.device_local_memory())
            .field("queue_family", &self.queue_family)
            .finish()
    }
}

/// Selects the GPU with the largest dedicated memory among the usable ones.
///
/// # Arguments
///
/// * `instance` - The Vulkan instance
/// * `surface` - The window surface for present support checking
/// * `surface_loader` - The surface extension loader
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no usable GPU is found.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let candidates = devices.into_iter().filter_map(|device| {
        let info = check_device_suitability(instance, device, surface, surface_loader)?;
        let score = SelectionScore::new(info.properties.device_type, info.device_local_memory());
        debug!(
            "GPU '{}' ({}) - {} MiB device-local",
            info.device_name(),
            info.device_type_name(),
            score.memory / (1024 * 1024)
        );
        Some((info, score))
    });

    let Some(selected) = pick_best(candidates) else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Picked {} ({}) - Vulkan {}.{}.{}, {} MiB device-local",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        selected.device_local_memory() / (1024 * 1024)
    );

    Ok(selected)
}

/// Ranking key for adapters; compares `dedicated` first, then `memory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SelectionScore {
    /// The device has its own memory rather than sharing system RAM.
    dedicated: bool,
    /// Sum of the device-local heaps in bytes.
    memory: u64,
}

impl SelectionScore {
    fn new(device_type: vk::PhysicalDeviceType, memory: u64) -> Self {
        let dedicated = matches!(
            device_type,
            vk::PhysicalDeviceType::DISCRETE_GPU | vk::PhysicalDeviceType::VIRTUAL_GPU
        );
        Self { dedicated, memory }
    }
}

/// Returns the candidate with the highest key; the earliest one wins ties.
fn pick_best<T, K: Ord>(candidates: impl IntoIterator<Item = (T, K)>) -> Option<T> {
    let mut best: Option<(T, K)> = None;
    for (candidate, key) in candidates {
        let better = match &best {
            Some((_, best_key)) => key > *best_key,
            None => true,
        };
        if better {
            best = Some((candidate, key));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Sums the sizes of all heaps flagged `DEVICE_LOCAL`.
fn device_local_memory(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory_properties
        .memory_heaps
        .iter()
        .take(memory_properties.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

/// Checks if a physical device can run the frame loop.
///
/// Returns `Some(PhysicalDeviceInfo)` if the device meets all requirements,
/// or `None` if it doesn't.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    if vk::api_version_major(properties.api_version) == 1
        && vk::api_version_minor(properties.api_version) < 3
    {
        debug!(
            "GPU '{}' skipped: Vulkan 1.3 not supported (version: {}.{})",
            device_name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features_1_2)
        .push_next(&mut features_1_3);
    unsafe { instance.get_physical_device_features2(device, &mut features) };

    if features_1_2.timeline_semaphore == vk::FALSE || features_1_3.dynamic_rendering == vk::FALSE
    {
        debug!(
            "GPU '{}' skipped: timeline semaphores or dynamic rendering unsupported",
            device_name
        );
        return None;
    }

    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let queue_family = find_graphics_present_family(&families, |index| unsafe {
        surface_loader
            .get_physical_device_surface_support(device, index, surface)
            .unwrap_or(false)
    });

    let Some(queue_family) = queue_family else {
        debug!(
            "GPU '{}' skipped: no queue family supports both graphics and present",
            device_name
        );
        return None;
    };

    Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_family,
    })
}

/// Finds the first queue family that supports graphics and can present.
fn find_graphics_present_family(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|(index, _)| index as u32)
        .find(|&index| supports_present(index))
}
