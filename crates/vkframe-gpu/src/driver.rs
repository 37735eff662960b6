//! The device-level operations the harness performs.
//!
//! [`DeviceContext`](crate::DeviceContext) implements [`Driver`] on top of
//! `ash`. Everything above this trait (resource factory, swapchain manager,
//! frame loop, teardown) is written against it, which lets the same code run
//! against a recording driver in tests.

use crate::error::Result;
use ash::vk;

/// Device-level Vulkan operations used by the harness.
///
/// Handles passed in must have been produced by the same driver. Methods that
/// record or submit work are `unsafe` for the same reasons the underlying
/// Vulkan calls are: the caller is responsible for external synchronization
/// and for not using a handle after it was destroyed.
pub trait Driver {
    /// The single graphics queue.
    fn graphics_queue(&self) -> vk::Queue;

    /// Family index of the graphics queue.
    fn graphics_queue_family(&self) -> u32;

    /// Cached memory properties of the physical device.
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    /// Current capabilities of the presentation surface.
    fn surface_capabilities(&self) -> Result<vk::SurfaceCapabilitiesKHR>;

    /// Formats the presentation surface supports.
    fn surface_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>>;

    /// The presentation surface.
    fn surface(&self) -> vk::SurfaceKHR;

    // Creation

    /// # Safety
    /// The create info must be valid for this device.
    unsafe fn create_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> Result<vk::CommandPool>;

    /// # Safety
    /// The pool named in `allocate_info` must belong to this device.
    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>>;

    /// # Safety
    /// The create info must be valid for this device and its surface.
    unsafe fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> Result<vk::SwapchainKHR>;

    /// # Safety
    /// The swapchain must be valid.
    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;

    /// # Safety
    /// The create info must be valid for this device.
    unsafe fn create_image(&self, create_info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image>;

    /// # Safety
    /// The image must be valid.
    unsafe fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    /// # Safety
    /// The allocate info must be valid for this device.
    unsafe fn allocate_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
    ) -> Result<vk::DeviceMemory>;

    /// Bind `memory` to `image` at offset 0.
    ///
    /// # Safety
    /// Both handles must be valid and the image must not be bound yet.
    unsafe fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()>;

    /// # Safety
    /// The create info must be valid for this device.
    unsafe fn create_image_view(
        &self,
        create_info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView>;

    /// # Safety
    /// The create info must be valid for this device.
    unsafe fn create_render_pass(
        &self,
        create_info: &vk::RenderPassCreateInfo<'_>,
    ) -> Result<vk::RenderPass>;

    /// # Safety
    /// The create info must be valid for this device.
    unsafe fn create_framebuffer(
        &self,
        create_info: &vk::FramebufferCreateInfo<'_>,
    ) -> Result<vk::Framebuffer>;

    /// # Safety
    /// The device must be valid.
    unsafe fn create_fence(&self, signaled: bool) -> Result<vk::Fence>;

    /// # Safety
    /// The device must be valid.
    unsafe fn create_semaphore(&self) -> Result<vk::Semaphore>;

    // Per-frame

    /// Acquire the next presentable image, signaling `semaphore` once the
    /// presentation engine has released it.
    ///
    /// # Safety
    /// The swapchain and semaphore must be valid and the semaphore unsignaled.
    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<u32>;

    /// Block until `fence` is signaled.
    ///
    /// # Safety
    /// The fence must be valid.
    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()>;

    /// Reset `fence` to the unsignaled state.
    ///
    /// # Safety
    /// The fence must be valid and not referenced by pending work.
    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()>;

    /// Begin recording; implicitly resets the command buffer.
    ///
    /// # Safety
    /// The command buffer must not be pending execution.
    unsafe fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> Result<()>;

    /// # Safety
    /// The command buffer must be recording with no render pass active.
    unsafe fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()>;

    /// # Safety
    /// The command buffer must be recording outside a render pass.
    unsafe fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo<'_>,
    );

    /// # Safety
    /// The command buffer must be inside a render pass.
    unsafe fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    /// Submit to the graphics queue, signaling `fence` on completion.
    ///
    /// # Safety
    /// Every handle referenced by `submit_info` must be valid and the fence
    /// unsignaled.
    unsafe fn queue_submit(&self, submit_info: &vk::SubmitInfo<'_>, fence: vk::Fence)
        -> Result<()>;

    /// Queue an image for presentation on the graphics queue.
    ///
    /// # Safety
    /// Every handle referenced by `present_info` must be valid.
    unsafe fn queue_present(&self, present_info: &vk::PresentInfoKHR<'_>) -> Result<()>;

    // Teardown

    /// Block until all submitted work has completed.
    ///
    /// # Safety
    /// The device must be valid.
    unsafe fn device_wait_idle(&self) -> Result<()>;

    /// Destroy (or free) a resource created through this driver.
    ///
    /// # Safety
    /// The resource must not be referenced by pending GPU work and must not be
    /// used afterwards.
    unsafe fn destroy(&self, resource: &Resource);
}

/// A device-owned object that must be explicitly destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    CommandPool(vk::CommandPool),
    CommandBuffers {
        pool: vk::CommandPool,
        buffers: Vec<vk::CommandBuffer>,
    },
    Swapchain(vk::SwapchainKHR),
    Image(vk::Image),
    Memory(vk::DeviceMemory),
    ImageView(vk::ImageView),
    RenderPass(vk::RenderPass),
    Framebuffer(vk::Framebuffer),
    Fence(vk::Fence),
    Semaphore(vk::Semaphore),
}

/// The kind of a [`Resource`], without its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    CommandPool,
    CommandBuffers,
    Swapchain,
    Image,
    Memory,
    ImageView,
    RenderPass,
    Framebuffer,
    Fence,
    Semaphore,
}

impl Resource {
    /// The kind of this resource.
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::CommandPool(_) => ResourceKind::CommandPool,
            Self::CommandBuffers { .. } => ResourceKind::CommandBuffers,
            Self::Swapchain(_) => ResourceKind::Swapchain,
            Self::Image(_) => ResourceKind::Image,
            Self::Memory(_) => ResourceKind::Memory,
            Self::ImageView(_) => ResourceKind::ImageView,
            Self::RenderPass(_) => ResourceKind::RenderPass,
            Self::Framebuffer(_) => ResourceKind::Framebuffer,
            Self::Fence(_) => ResourceKind::Fence,
            Self::Semaphore(_) => ResourceKind::Semaphore,
        }
    }
}
