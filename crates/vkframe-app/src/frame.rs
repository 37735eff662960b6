//! Per-frame context for drawing.

use ash::vk;

/// Context for the frame being recorded.
///
/// The render pass is already active on `command_buffer` when the draw
/// callback sees this; the callback must neither end it nor end the command
/// buffer.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Command buffer for recording draw commands.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired swapchain image.
    pub image_index: u32,
    /// Framebuffer bound for this image.
    pub framebuffer: vk::Framebuffer,
    /// Extent of the render area.
    pub extent: vk::Extent2D,
    /// Frames rendered before this one.
    pub frame_number: u64,
}
