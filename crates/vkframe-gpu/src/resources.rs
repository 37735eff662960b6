//! Render targets: depth buffer, image views, render pass and framebuffers.

use crate::driver::{Driver, Resource};
use crate::error::Result;
use crate::memory::allocate_image_memory;
use crate::stack::ResourceStack;
use ash::vk;

/// Format of the shared depth buffer.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Attachment slot of the color target in the render pass.
pub const COLOR_ATTACHMENT: u32 = 0;
/// Attachment slot of the depth target in the render pass.
pub const DEPTH_ATTACHMENT: u32 = 1;

/// The single depth buffer shared by every framebuffer.
#[derive(Debug, Clone, Copy)]
pub struct DepthTarget {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

impl DepthTarget {
    /// Create the depth image, back it with device-local memory and create
    /// its view.
    ///
    /// # Safety
    /// The driver must be valid.
    pub unsafe fn new<D: Driver + ?Sized>(
        driver: &D,
        stack: &mut ResourceStack,
        extent: vk::Extent2D,
    ) -> Result<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = driver.create_image(&create_info)?;
        stack.push(Resource::Image(image));

        let memory =
            allocate_image_memory(driver, stack, image, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;

        let view = create_image_view(
            driver,
            stack,
            image,
            DEPTH_FORMAT,
            vk::ImageAspectFlags::DEPTH,
        )?;

        Ok(Self {
            image,
            memory,
            view,
            extent,
        })
    }
}

/// Create a 2D view with identity swizzle over one mip level and one layer.
///
/// # Safety
/// The image must belong to the driver.
pub unsafe fn create_image_view<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = driver.create_image_view(&view_info)?;
    stack.push(Resource::ImageView(view));
    Ok(view)
}

/// Create one color view per swapchain image, in image order.
///
/// # Safety
/// The images must come from a swapchain of the driver.
pub unsafe fn create_color_views<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>> {
    images
        .iter()
        .map(|&image| create_image_view(driver, stack, image, format, vk::ImageAspectFlags::COLOR))
        .collect()
}

/// Attachment descriptions for the color + depth render pass.
pub fn render_pass_attachments(color_format: vk::Format) -> [vk::AttachmentDescription; 2] {
    let color = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth = vk::AttachmentDescription::default()
        .format(DEPTH_FORMAT)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    [color, depth]
}

/// Create the render pass: one graphics subpass writing color slot 0 and
/// depth slot 1.
///
/// # Safety
/// The driver must be valid.
pub unsafe fn create_render_pass<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    color_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = render_pass_attachments(color_format);

    let color_refs = [vk::AttachmentReference::default()
        .attachment(COLOR_ATTACHMENT)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref = vk::AttachmentReference::default()
        .attachment(DEPTH_ATTACHMENT)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    // The layout transitions must wait for the acquire semaphore, which is
    // waited on at COLOR_ATTACHMENT_OUTPUT, and for the previous frame's
    // depth writes to the shared depth buffer.
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = driver.create_render_pass(&create_info)?;
    stack.push(Resource::RenderPass(render_pass));
    Ok(render_pass)
}

/// Create one framebuffer per color view, all sharing `depth_view`.
///
/// # Safety
/// All handles must belong to the driver.
pub unsafe fn create_framebuffers<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    render_pass: vk::RenderPass,
    color_views: &[vk::ImageView],
    depth_view: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<Vec<vk::Framebuffer>> {
    color_views
        .iter()
        .map(|&color_view| {
            let attachments = [color_view, depth_view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = driver.create_framebuffer(&create_info)?;
            stack.push(Resource::Framebuffer(framebuffer));
            Ok(framebuffer)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_attachment_ends_presentable() {
        let [color, _] = render_pass_attachments(vk::Format::B8G8R8A8_UNORM);
        assert_eq!(color.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn depth_attachment_uses_fixed_format() {
        let [_, depth] = render_pass_attachments(vk::Format::R8G8B8A8_SRGB);
        assert_eq!(depth.format, DEPTH_FORMAT);
        assert_eq!(depth.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(
            depth.final_layout,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        );
    }
}
