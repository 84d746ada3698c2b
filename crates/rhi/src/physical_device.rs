//! Physical device (GPU) selection.
//!
//! Enumerates adapters and picks one that can actually present to the
//! surface: graphics + present queue families and the swapchain extension
//! are required, discrete GPUs win ties, and a combined graphics/present
//! family is preferred so the hot path runs on a single queue.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices for the queue types the manager uses.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Family supporting graphics operations.
    pub graphics_family: Option<u32>,
    /// Family supporting presentation to the surface.
    pub present_family: Option<u32>,
    /// Family supporting compute, when one exists.
    pub compute_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Whether the minimum required families (graphics + present) are there.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Whether graphics and present share one family.
    #[inline]
    pub fn is_unified(&self) -> bool {
        self.is_complete() && self.graphics_family == self.present_family
    }

    /// Unique family indices, for device creation without duplicate queues.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(3);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        if let Some(compute) = self.compute_family
            && !families.contains(&compute)
        {
            families.push(compute);
        }

        families
    }
}

/// Everything device creation needs to know about the selected adapter.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// The adapter name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// A human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// The Vulkan API version the adapter supports.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable adapter for presenting to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableDevice`] if no adapter has the required
/// queue families, extensions, and presentation support.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableDevice);
    }

    debug!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;

    for device in devices {
        let Some(info) = check_device_suitability(instance, device, surface, surface_loader)?
        else {
            continue;
        };

        let score = rate_device(&info);
        debug!(
            "GPU '{}' ({}) scored {}",
            info.device_name(),
            info.device_type_name(),
            score
        );

        if best.as_ref().is_none_or(|(_, s)| score > *s) {
            best = Some((info, score));
        }
    }

    let Some((selected, score)) = best else {
        warn!("No GPU satisfied the required capabilities");
        return Err(RhiError::NoSuitableDevice);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, score {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected)
}

/// Returns `Some(info)` when the adapter meets every hard requirement.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<Option<PhysicalDeviceInfo>, RhiError> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let queue_families = find_queue_families(instance, device, surface, surface_loader)?;
    if !queue_families.is_complete() {
        return Ok(None);
    }

    if !supports_swapchain_extension(instance, device)? {
        return Ok(None);
    }

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    }))
}

/// Locates graphics, present, and compute queue families on the adapter.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<QueueFamilyIndices, RhiError> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let index = i as u32;

        let supports_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let supports_present = unsafe {
            surface_loader.get_physical_device_surface_support(device, index, surface)?
        };

        // A family doing both keeps acquire/submit/present on one queue.
        if supports_graphics && supports_present {
            indices.graphics_family = Some(index);
            indices.present_family = Some(index);
        } else {
            if supports_graphics && indices.graphics_family.is_none() {
                indices.graphics_family = Some(index);
            }
            if supports_present && indices.present_family.is_none() {
                indices.present_family = Some(index);
            }
        }

        if family.queue_flags.contains(vk::QueueFlags::COMPUTE)
            && indices.compute_family.is_none()
        {
            indices.compute_family = Some(index);
        }
    }

    Ok(indices)
}

/// Checks that VK_KHR_swapchain is available on the adapter.
fn supports_swapchain_extension(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<bool, RhiError> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };

    let wanted = ash::khr::swapchain::NAME.to_bytes_with_nul();
    let found = extensions.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name.to_bytes_with_nul() == wanted
    });

    Ok(found)
}

/// Scores a suitable adapter; highest wins.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 300,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        _ => 10,
    };

    if info.queue_families.is_unified() {
        score += 100;
    }

    // One point per GiB of device-local memory as a weak tiebreaker.
    score += (info.device_local_memory() / (1024 * 1024 * 1024)) as u32;

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_family_indices_completeness() {
        let empty = QueueFamilyIndices::default();
        assert!(!empty.is_complete());

        let complete = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            compute_family: None,
        };
        assert!(complete.is_complete());
        assert!(complete.is_unified());

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
            compute_family: None,
        };
        assert!(split.is_complete());
        assert!(!split.is_unified());
    }

    #[test]
    fn test_unique_families_deduplicates() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            compute_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 2]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
            compute_family: Some(1),
        };
        assert_eq!(split.unique_families(), vec![0, 1]);
    }
}
