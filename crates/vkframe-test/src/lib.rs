//! Test support for vkframe.
//!
//! Provides a [`RecordingDriver`] that implements the device operations
//! without a GPU, hands out fake handles, and records every call so tests
//! can assert on ordering and on what is left alive.

pub mod recording;

pub use recording::{
    Call, CommandPoolRecord, FramebufferRecord, ImageRecord, Recorder, RecordingDriver,
    RenderPassRecord, SubpassRecord, SwapchainRequest,
};

use ash::vk;
use vkframe_gpu::ResourceKind;

/// Make the `nth` creation (0-based) of `kind` fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailPoint {
    pub kind: ResourceKind,
    pub nth: usize,
}

/// What the recording driver reports about its fake device and surface.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Memory types any image may live in.
    pub memory_type_bits: u32,
    /// Images the swapchain hands out. `None` means exactly as many as
    /// requested.
    pub swapchain_image_count: Option<u32>,
    pub fail_on: Option<FailPoint>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                // Surface leaves the size to the swapchain
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            memory_properties: memory_properties(&[
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            ]),
            memory_type_bits: 0b11,
            swapchain_image_count: None,
            fail_on: None,
        }
    }
}

impl MockConfig {
    /// Report a fixed current extent.
    pub fn with_current_extent(mut self, width: u32, height: u32) -> Self {
        self.capabilities.current_extent = vk::Extent2D { width, height };
        self
    }

    /// Report a minimum swapchain image count.
    pub fn with_min_image_count(mut self, count: u32) -> Self {
        self.capabilities.min_image_count = count;
        self
    }

    /// Hand out `count` swapchain images regardless of the request.
    pub fn with_swapchain_image_count(mut self, count: u32) -> Self {
        self.swapchain_image_count = Some(count);
        self
    }

    pub fn with_formats(mut self, formats: Vec<vk::SurfaceFormatKHR>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_memory_types(mut self, types: &[vk::MemoryPropertyFlags]) -> Self {
        self.memory_properties = memory_properties(types);
        self
    }

    pub fn failing_on(mut self, kind: ResourceKind, nth: usize) -> Self {
        self.fail_on = Some(FailPoint { kind, nth });
        self
    }
}

/// Memory properties with one type per entry, all on heap 0.
pub fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: types.len() as u32,
        memory_heap_count: 1,
        ..Default::default()
    };
    for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
        *slot = vk::MemoryType {
            property_flags: flags,
            heap_index: 0,
        };
    }
    props.memory_heaps[0] = vk::MemoryHeap {
        size: 256 << 20,
        flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
    };
    props
}
