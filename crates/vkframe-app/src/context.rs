//! Application context.
//!
//! Frame objects are destroyed in exact reverse creation order: semaphores,
//! fences, command buffers, framebuffers, render pass, depth target, color
//! views, swapchain and finally the command pool. Teardown only starts after
//! a full device-idle wait, so no object is still in use by then.

use ash::vk;
use vkframe_gpu::command::{
    begin_command_buffer, create_command_pool, end_command_buffer, submit_command_buffer,
};
use vkframe_gpu::resources::{create_framebuffers, create_render_pass};
use vkframe_gpu::{
    DepthTarget, DeviceContext, Driver, FrameSync, GpuError, PerImageResources, ResourceStack,
    Swapchain, SwapchainConfig,
};

use crate::frame::FrameContext;

/// Clear color used when none is configured.
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.5, 0.25, 0.25, 0.0];

/// Rendering configuration.
#[derive(Debug, Clone, Copy)]
pub struct RenderConfig {
    pub swapchain: SwapchainConfig,
    /// Color the color attachment is cleared to at the start of every frame.
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            swapchain: SwapchainConfig::default(),
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

/// Everything the frame loop needs, on top of a device context.
///
/// Resources are created in dependency order and pushed onto a
/// [`ResourceStack`]; teardown pops that stack after a full idle wait.
pub struct AppContext<D: Driver = DeviceContext> {
    stack: ResourceStack,
    command_pool: vk::CommandPool,
    swapchain: Swapchain,
    depth: DepthTarget,
    render_pass: vk::RenderPass,
    per_image: PerImageResources,
    sync: FrameSync,
    clear_color: [f32; 4],
    /// Total frames rendered.
    pub frame_count: u64,
    /// Set once a frame has failed; no frame is rendered after that.
    failed: bool,
    // Dropped last, after the stack has been unwound
    driver: D,
}

struct Resources {
    command_pool: vk::CommandPool,
    swapchain: Swapchain,
    depth: DepthTarget,
    render_pass: vk::RenderPass,
    per_image: PerImageResources,
    sync: FrameSync,
}

impl<D: Driver> AppContext<D> {
    /// Create the swapchain and every per-frame resource.
    ///
    /// `window_extent` is only called when the surface leaves the swapchain
    /// size to the application. On failure everything created so far is
    /// destroyed and the driver is dropped.
    pub fn new(
        driver: D,
        config: &RenderConfig,
        window_extent: impl FnOnce() -> vk::Extent2D,
    ) -> vkframe_gpu::Result<Self> {
        let mut stack = ResourceStack::new();

        // SAFETY: every handle is created through `driver` and tracked on `stack`
        match unsafe { create_resources(&driver, &mut stack, config, window_extent) } {
            Ok(resources) => {
                tracing::info!(
                    "Frame resources ready: {} images, {} tracked objects",
                    resources.per_image.len(),
                    stack.len()
                );
                Ok(Self {
                    stack,
                    command_pool: resources.command_pool,
                    swapchain: resources.swapchain,
                    depth: resources.depth,
                    render_pass: resources.render_pass,
                    per_image: resources.per_image,
                    sync: resources.sync,
                    clear_color: config.clear_color,
                    frame_count: 0,
                    failed: false,
                    driver,
                })
            }
            Err(e) => {
                tracing::error!(
                    "Initialization failed: {e}; releasing {} objects",
                    stack.len()
                );
                // SAFETY: nothing has been submitted yet
                unsafe { stack.unwind(&driver) };
                Err(e)
            }
        }
    }

    /// Render one frame.
    ///
    /// Acquires an image, waits for that image's fence, records the command
    /// buffer around `draw`, resets the fence, submits and presents. Every
    /// failure is returned as-is; there is no retry. After a failure the
    /// semaphores, fences and command buffers may be left mid-frame, so every
    /// later call fails without touching the driver. Teardown still works.
    pub fn render_frame(
        &mut self,
        draw: impl FnOnce(&Self, &FrameContext) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if self.failed {
            return Err(GpuError::InvalidState(format!(
                "rendering stopped after frame {} failed",
                self.frame_count
            ))
            .into());
        }

        let result = self.run_frame(draw);
        if let Err(e) = &result {
            tracing::error!("Frame {} failed: {e:#}", self.frame_count);
            self.failed = true;
        }
        result
    }

    fn run_frame(
        &mut self,
        draw: impl FnOnce(&Self, &FrameContext) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let frame_number = self.frame_count;

        let image_index = {
            let _span = tracing::trace_span!("frame.acquire", frame_number).entered();
            // SAFETY: swapchain and semaphore are live until teardown
            unsafe {
                self.swapchain
                    .acquire_next_image(&self.driver, self.sync.present_completed)?
            }
        };
        let (framebuffer, command_buffer, fence) = self.per_image.get(image_index)?;

        {
            let _span = tracing::trace_span!("frame.wait_fence", image_index).entered();
            // The previous submit that used this image's command buffer must
            // have finished before it is re-recorded.
            // SAFETY: fence is live until teardown
            unsafe { self.driver.wait_for_fence(fence, u64::MAX)? };
        }

        {
            let _span = tracing::trace_span!("frame.record", image_index).entered();
            let extent = self.swapchain.extent;

            // SAFETY: the fence wait above guarantees the buffer is not pending
            unsafe {
                begin_command_buffer(&self.driver, command_buffer)?;

                let clear_values = [
                    vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: self.clear_color,
                        },
                    },
                    vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth: 1.0,
                            stencil: 0,
                        },
                    },
                ];
                let begin_info = vk::RenderPassBeginInfo::default()
                    .render_pass(self.render_pass)
                    .framebuffer(framebuffer)
                    .render_area(vk::Rect2D {
                        offset: vk::Offset2D::default(),
                        extent,
                    })
                    .clear_values(&clear_values);
                self.driver
                    .cmd_begin_render_pass(command_buffer, &begin_info);
            }

            let frame = FrameContext {
                command_buffer,
                image_index,
                framebuffer,
                extent,
                frame_number,
            };
            draw(self, &frame)?;

            // SAFETY: the render pass begun above is still active
            unsafe {
                self.driver.cmd_end_render_pass(command_buffer);
                end_command_buffer(&self.driver, command_buffer)?;
            }
        }

        {
            let _span = tracing::trace_span!("frame.submit", image_index).entered();
            // SAFETY: all handles are live; the fence is reset before it is
            // handed to the submit
            unsafe {
                self.driver.reset_fence(fence)?;
                submit_command_buffer(
                    &self.driver,
                    command_buffer,
                    self.sync.present_completed,
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    self.sync.render_completed,
                    fence,
                )?;
            }
        }

        {
            let _span = tracing::trace_span!("frame.present", image_index).entered();
            // SAFETY: swapchain and semaphore are live until teardown
            unsafe {
                self.swapchain
                    .present(&self.driver, image_index, self.sync.render_completed)?;
            }
        }

        self.frame_count += 1;
        Ok(())
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> vkframe_gpu::Result<()> {
        // SAFETY: the driver is live for as long as the context is
        unsafe { self.driver.device_wait_idle() }
    }

    /// Destroy every tracked object in reverse creation order.
    ///
    /// The device must be idle. Calling this again is a no-op.
    pub(crate) fn release(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        tracing::info!("Releasing {} frame objects", self.stack.len());
        // SAFETY: caller guarantees the device is idle
        unsafe { self.stack.unwind(&self.driver) };
    }

    /// The driver the context was built on.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get the swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    /// Number of swapchain images.
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn depth(&self) -> &DepthTarget {
        &self.depth
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn per_image(&self) -> &PerImageResources {
        &self.per_image
    }

    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Whether a frame has failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Objects created by this context and not destroyed yet.
    pub fn live_objects(&self) -> usize {
        self.stack.len()
    }
}

impl<D: Driver> Drop for AppContext<D> {
    fn drop(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        if let Err(e) = self.wait_idle() {
            tracing::error!("Failed to wait idle: {e}");
        }
        self.release();
    }
}

/// Create every frame resource in dependency order.
///
/// # Safety
/// The driver must be valid and its surface must not have a swapchain.
unsafe fn create_resources<D: Driver>(
    driver: &D,
    stack: &mut ResourceStack,
    config: &RenderConfig,
    window_extent: impl FnOnce() -> vk::Extent2D,
) -> vkframe_gpu::Result<Resources> {
    unsafe {
        let command_pool = create_command_pool(driver, stack)?;
        let swapchain = Swapchain::new(driver, stack, &config.swapchain, window_extent)?;
        let depth = DepthTarget::new(driver, stack, swapchain.extent)?;
        let render_pass = create_render_pass(driver, stack, swapchain.format.format)?;
        let framebuffers = create_framebuffers(
            driver,
            stack,
            render_pass,
            &swapchain.image_views,
            depth.view,
            swapchain.extent,
        )?;
        let per_image = PerImageResources::new(driver, stack, command_pool, framebuffers)?;
        let sync = FrameSync::new(driver, stack)?;

        if per_image.len() != swapchain.image_count() {
            return Err(GpuError::InvalidState(format!(
                "{} per-image entries for {} swapchain images",
                per_image.len(),
                swapchain.image_count()
            )));
        }

        Ok(Resources {
            command_pool,
            swapchain,
            depth,
            render_pass,
            per_image,
            sync,
        })
    }
}
