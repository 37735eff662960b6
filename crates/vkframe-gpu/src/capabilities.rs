//! Capability probing: physical devices, queue families, surface formats and
//! memory types.
//!
//! Everything here is a read-only query against the driver or a pure decision
//! over the results of one, so the decisions can be tested without a GPU.

use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// A physical device as presented to a [`DeviceSelector`].
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Physical device handle.
    pub handle: vk::PhysicalDevice,
    /// GPU vendor.
    pub vendor: GpuVendor,
    /// Device name reported by the driver.
    pub device_name: String,
    /// Discrete, integrated, virtual, CPU...
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version.
    pub api_version: u32,
    /// Device-local memory in MB.
    pub device_local_memory_mb: u64,
    /// Queue families in driver order.
    pub queue_families: Vec<vk::QueueFamilyProperties>,
}

impl DeviceCandidate {
    /// Query a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = instance.get_physical_device_properties(physical_device);
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);
        let queue_families =
            instance.get_physical_device_queue_family_properties(physical_device);

        let device_name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        Self {
            handle: physical_device,
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            device_local_memory_mb: device_local_memory_mb(&memory_properties),
            queue_families,
        }
    }

    /// Index of the first graphics-capable queue family.
    pub fn graphics_queue_family(&self) -> Option<u32> {
        find_graphics_queue_family(&self.queue_families)
    }

    /// Get a human-readable summary of the device.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}

/// Picks one of the enumerated devices, or none.
///
/// Returns an index into the candidate slice.
pub type DeviceSelector = Box<dyn Fn(&[DeviceCandidate]) -> Option<usize>>;

/// Select the first enumerated device, whatever it is.
pub fn first_device(candidates: &[DeviceCandidate]) -> Option<usize> {
    if candidates.is_empty() {
        None
    } else {
        Some(0)
    }
}

/// Select the highest-ranked device that has a graphics queue.
///
/// Discrete GPUs rank above integrated ones, then more VRAM wins.
pub fn prefer_discrete(candidates: &[DeviceCandidate]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.graphics_queue_family().is_some())
        .max_by_key(|(i, c)| (score_device(c), std::cmp::Reverse(*i)))
        .map(|(i, _)| i)
}

fn score_device(candidate: &DeviceCandidate) -> u64 {
    let type_score = match candidate.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 0,
    };

    // +1 per GB
    type_score + candidate.device_local_memory_mb / 1024
}

fn device_local_memory_mb(memory: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory
        .memory_heaps
        .iter()
        .take(memory.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size / (1024 * 1024))
        .sum()
}

/// Find the first queue family that supports graphics.
pub fn find_graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

/// Select the first surface format whose format matches `preferred`.
///
/// A surface reporting a single `UNDEFINED` entry accepts any format, in which
/// case `preferred` is returned with the sRGB non-linear color space.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::Format,
) -> Result<vk::SurfaceFormatKHR> {
    if let [only] = available {
        if only.format == vk::Format::UNDEFINED {
            return Ok(vk::SurfaceFormatKHR {
                format: preferred,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            });
        }
    }

    available
        .iter()
        .find(|f| f.format == preferred)
        .copied()
        .ok_or(GpuError::SurfaceFormatUnavailable(preferred))
}

/// Find a memory type allowed by `type_bits` whose flags include `required`.
///
/// `type_bits` is the mask from `vk::MemoryRequirements`: bit `i` set means
/// memory type `i` may back the resource. The lowest matching index wins.
pub fn find_memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32> {
    properties
        .memory_types
        .iter()
        .take(properties.memory_type_count as usize)
        .enumerate()
        .find(|(i, memory_type)| {
            type_bits & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
        .ok_or(GpuError::NoMatchingMemoryType {
            type_bits,
            properties: required,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn candidate(
        device_type: vk::PhysicalDeviceType,
        vram_mb: u64,
        families: Vec<vk::QueueFamilyProperties>,
    ) -> DeviceCandidate {
        DeviceCandidate {
            handle: vk::PhysicalDevice::null(),
            vendor: GpuVendor::Other(0),
            device_name: "test".to_string(),
            device_type,
            api_version: vk::API_VERSION_1_1,
            device_local_memory_mb: vram_mb,
            queue_families: families,
        }
    }

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = flags;
        }
        props
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn first_device_takes_index_zero() {
        let graphics = vec![family(vk::QueueFlags::GRAPHICS)];
        let devices = [
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 512, graphics.clone()),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 8192, graphics),
        ];
        assert_eq!(first_device(&devices), Some(0));
        assert_eq!(first_device(&[]), None);
    }

    #[test]
    fn prefer_discrete_ranks_by_type_then_memory() {
        let graphics = vec![family(vk::QueueFlags::GRAPHICS)];
        let devices = [
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384, graphics.clone()),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 4096, graphics.clone()),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 8192, graphics),
        ];
        assert_eq!(prefer_discrete(&devices), Some(2));
    }

    #[test]
    fn prefer_discrete_skips_devices_without_graphics() {
        let devices = [
            candidate(
                vk::PhysicalDeviceType::DISCRETE_GPU,
                8192,
                vec![family(vk::QueueFlags::COMPUTE)],
            ),
            candidate(
                vk::PhysicalDeviceType::CPU,
                0,
                vec![family(vk::QueueFlags::GRAPHICS)],
            ),
        ];
        assert_eq!(prefer_discrete(&devices), Some(1));
    }

    #[test]
    fn graphics_family_is_first_with_graphics_bit() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(find_graphics_queue_family(&families), Some(2));
    }

    #[test]
    fn graphics_family_missing() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        assert_eq!(find_graphics_queue_family(&families), None);
        assert_eq!(find_graphics_queue_family(&[]), None);
    }

    #[test]
    fn surface_format_first_match() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];
        let selected = select_surface_format(&formats, vk::Format::B8G8R8A8_UNORM).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_no_match_is_error() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let err = select_surface_format(&formats, vk::Format::B8G8R8A8_UNORM).unwrap_err();
        assert!(matches!(
            err,
            GpuError::SurfaceFormatUnavailable(vk::Format::B8G8R8A8_UNORM)
        ));
        assert!(select_surface_format(&[], vk::Format::B8G8R8A8_UNORM).is_err());
    }

    #[test]
    fn surface_format_undefined_accepts_preferred() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let selected = select_surface_format(&formats, vk::Format::B8G8R8A8_UNORM).unwrap();
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn memory_type_respects_mask_and_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        // All types allowed: lowest device-local wins.
        let index =
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);

        // Type 1 masked out: the superset at index 2 is accepted.
        let index =
            find_memory_type_index(&props, 0b101, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 2);
        assert!(props.memory_types[index as usize]
            .property_flags
            .contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
    }

    #[test]
    fn memory_type_no_match_is_error() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        let err =
            find_memory_type_index(&props, 0b01, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap_err();
        assert!(matches!(
            err,
            GpuError::NoMatchingMemoryType { type_bits: 0b01, .. }
        ));

        // Bits beyond memory_type_count are ignored.
        assert!(
            find_memory_type_index(&props, 0b100, vk::MemoryPropertyFlags::empty()).is_err()
        );
    }
}
