//! Vulkan bootstrap layer for vkframe.
//!
//! This crate provides:
//! - Instance, surface and logical device creation ([`DeviceContext`])
//! - Physical device probing and selection
//! - The [`Driver`] seam every higher layer is written against
//! - Swapchain, depth target, render pass and framebuffer construction
//! - Creation-ordered teardown via [`ResourceStack`]

pub mod capabilities;
pub mod command;
pub mod context;
pub mod debug;
pub mod driver;
pub mod error;
pub mod instance;
pub mod memory;
pub mod resources;
pub mod stack;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{
    find_graphics_queue_family, find_memory_type_index, first_device, prefer_discrete,
    select_surface_format, DeviceCandidate, DeviceSelector, GpuVendor,
};
pub use context::{DeviceContext, DeviceContextBuilder, ExtensionPolicy};
pub use driver::{Driver, Resource, ResourceKind};
pub use error::{GpuError, Result};
pub use resources::{DepthTarget, DEPTH_FORMAT};
pub use stack::ResourceStack;
pub use swapchain::{PerImageResources, Swapchain, SwapchainConfig};
pub use sync::{create_fence, create_semaphore, FrameSync};

pub use ash;
