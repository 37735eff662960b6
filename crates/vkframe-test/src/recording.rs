//! A [`Driver`] that records calls instead of talking to a GPU.
//!
//! Handles are sequential fake values. Submitted work completes the moment it
//! is submitted, so a fence is signaled right after the submit that carries
//! it. Waiting on an unsignaled fence with no submit pending would block
//! forever on a real device; here it is recorded as a blocked wait and
//! returns `TIMEOUT`.

use crate::MockConfig;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use vkframe_gpu::{Driver, GpuError, Resource, ResourceKind, Result};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(ResourceKind, u64),
    AllocateCommandBuffers {
        pool: u64,
        buffers: Vec<u64>,
    },
    BindImageMemory {
        image: u64,
        memory: u64,
    },
    AcquireNextImage {
        index: u32,
        semaphore: u64,
    },
    WaitForFence {
        fence: u64,
        blocked: bool,
    },
    ResetFence(u64),
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    BeginRenderPass {
        command_buffer: u64,
        render_pass: u64,
        framebuffer: u64,
        offset: (i32, i32),
        extent: vk::Extent2D,
        clear_color: [f32; 4],
        clear_depth: f32,
        clear_stencil: u32,
    },
    EndRenderPass(u64),
    Submit {
        command_buffers: Vec<u64>,
        wait_semaphores: Vec<u64>,
        wait_stages: Vec<vk::PipelineStageFlags>,
        signal_semaphores: Vec<u64>,
        fence: u64,
    },
    Present {
        image_indices: Vec<u32>,
        wait_semaphores: Vec<u64>,
    },
    DeviceWaitIdle,
    Destroy(ResourceKind, u64),
    /// The driver itself was dropped.
    Shutdown,
}

/// Parameters the swapchain was requested with.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainRequest {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
    /// Raw handle of the swapchain being replaced, 0 for none.
    pub old_swapchain: u64,
}

/// A created command pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPoolRecord {
    pub handle: u64,
    pub queue_family_index: u32,
    pub flags: vk::CommandPoolCreateFlags,
}

/// A created image and the parameters that matter to tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRecord {
    pub handle: u64,
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
}

/// One subpass of a created render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpassRecord {
    pub bind_point: vk::PipelineBindPoint,
    /// `(attachment, layout)` per color reference.
    pub color: Vec<(u32, vk::ImageLayout)>,
    pub depth: Option<(u32, vk::ImageLayout)>,
}

/// A created render pass.
#[derive(Debug, Clone)]
pub struct RenderPassRecord {
    pub handle: u64,
    pub attachments: Vec<vk::AttachmentDescription>,
    pub subpasses: Vec<SubpassRecord>,
    pub dependency_count: u32,
}

/// A created framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferRecord {
    pub handle: u64,
    pub attachments: Vec<u64>,
    pub width: u32,
    pub height: u32,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    next_handle: u64,
    created: HashMap<ResourceKind, usize>,
    outstanding: HashMap<u64, ResourceKind>,
    invalid_destroys: usize,
    fences: HashMap<u64, bool>,
    swapchain_images: Vec<vk::Image>,
    next_image: usize,
    swapchain_request: Option<SwapchainRequest>,
    command_pools: Vec<CommandPoolRecord>,
    render_passes: Vec<RenderPassRecord>,
    images: Vec<ImageRecord>,
    allocations: Vec<(u64, u32)>,
    framebuffers: Vec<FramebufferRecord>,
}

impl State {
    fn record(&mut self, call: Call) {
        self.calls.push(call);
    }

    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        // Keep clear of the fixed queue and surface handles
        0x1000 + self.next_handle
    }
}

/// Driver stand-in that records calls.
pub struct RecordingDriver {
    config: MockConfig,
    state: Arc<Mutex<State>>,
}

/// Read access to what a [`RecordingDriver`] did, usable after the driver is
/// gone.
#[derive(Clone)]
pub struct Recorder {
    state: Arc<Mutex<State>>,
}

const QUEUE_HANDLE: u64 = 0x10;
const SURFACE_HANDLE: u64 = 0x20;

impl RecordingDriver {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// A recorder sharing this driver's log.
    pub fn recorder(&self) -> Recorder {
        Recorder {
            state: Arc::clone(&self.state),
        }
    }

    fn create(&self, state: &mut State, kind: ResourceKind) -> Result<u64> {
        let count = state.created.entry(kind).or_default();
        let nth = *count;
        *count += 1;

        if let Some(fail) = self.config.fail_on {
            if fail.kind == kind && fail.nth == nth {
                tracing::debug!("Injected failure creating {kind:?} #{nth}");
                return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
        }

        let handle = state.handle();
        state.outstanding.insert(handle, kind);
        state.record(Call::Create(kind, handle));
        Ok(handle)
    }
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl Drop for RecordingDriver {
    fn drop(&mut self) {
        self.state.lock().record(Call::Shutdown);
    }
}

impl Driver for RecordingDriver {
    fn graphics_queue(&self) -> vk::Queue {
        vk::Queue::from_raw(QUEUE_HANDLE)
    }

    fn graphics_queue_family(&self) -> u32 {
        0
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.config.memory_properties
    }

    fn surface_capabilities(&self) -> Result<vk::SurfaceCapabilitiesKHR> {
        Ok(self.config.capabilities)
    }

    fn surface_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.config.formats.clone())
    }

    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(SURFACE_HANDLE)
    }

    unsafe fn create_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> Result<vk::CommandPool> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::CommandPool)?;
        state.command_pools.push(CommandPoolRecord {
            handle,
            queue_family_index: create_info.queue_family_index,
            flags: create_info.flags,
        });
        Ok(vk::CommandPool::from_raw(handle))
    }

    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let mut state = self.state.lock();
        let count = state.created.entry(ResourceKind::CommandBuffers).or_default();
        let nth = *count;
        *count += 1;
        if let Some(fail) = self.config.fail_on {
            if fail.kind == ResourceKind::CommandBuffers && fail.nth == nth {
                return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
        }

        let buffers: Vec<u64> = (0..allocate_info.command_buffer_count)
            .map(|_| state.handle())
            .collect();
        for &buffer in &buffers {
            state.outstanding.insert(buffer, ResourceKind::CommandBuffers);
        }
        state.record(Call::AllocateCommandBuffers {
            pool: allocate_info.command_pool.as_raw(),
            buffers: buffers.clone(),
        });

        Ok(buffers.into_iter().map(vk::CommandBuffer::from_raw).collect())
    }

    unsafe fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> Result<vk::SwapchainKHR> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::Swapchain)?;

        let count = self
            .config
            .swapchain_image_count
            .unwrap_or(create_info.min_image_count);
        // Images belong to the swapchain and are never destroyed separately
        let images = (0..count)
            .map(|_| vk::Image::from_raw(state.handle()))
            .collect();
        state.swapchain_images = images;
        state.next_image = 0;
        state.swapchain_request = Some(SwapchainRequest {
            min_image_count: create_info.min_image_count,
            format: create_info.image_format,
            color_space: create_info.image_color_space,
            extent: create_info.image_extent,
            array_layers: create_info.image_array_layers,
            usage: create_info.image_usage,
            sharing_mode: create_info.image_sharing_mode,
            pre_transform: create_info.pre_transform,
            composite_alpha: create_info.composite_alpha,
            present_mode: create_info.present_mode,
            clipped: create_info.clipped == vk::TRUE,
            old_swapchain: create_info.old_swapchain.as_raw(),
        });

        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    unsafe fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        Ok(self.state.lock().swapchain_images.clone())
    }

    unsafe fn create_image(&self, create_info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::Image)?;
        state.images.push(ImageRecord {
            handle,
            image_type: create_info.image_type,
            format: create_info.format,
            extent: create_info.extent,
            mip_levels: create_info.mip_levels,
            array_layers: create_info.array_layers,
            samples: create_info.samples,
            usage: create_info.usage,
        });
        Ok(vk::Image::from_raw(handle))
    }

    unsafe fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let state = self.state.lock();
        let size = state
            .images
            .iter()
            .find(|record| record.handle == image.as_raw())
            .map_or(0, |record| {
                u64::from(record.extent.width) * u64::from(record.extent.height) * 4
            });
        vk::MemoryRequirements {
            size,
            alignment: 256,
            memory_type_bits: self.config.memory_type_bits,
        }
    }

    unsafe fn allocate_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
    ) -> Result<vk::DeviceMemory> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::Memory)?;
        state
            .allocations
            .push((handle, allocate_info.memory_type_index));
        Ok(vk::DeviceMemory::from_raw(handle))
    }

    unsafe fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()> {
        self.state.lock().record(Call::BindImageMemory {
            image: image.as_raw(),
            memory: memory.as_raw(),
        });
        Ok(())
    }

    unsafe fn create_image_view(
        &self,
        _create_info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView> {
        let mut state = self.state.lock();
        self.create(&mut state, ResourceKind::ImageView)
            .map(vk::ImageView::from_raw)
    }

    unsafe fn create_render_pass(
        &self,
        create_info: &vk::RenderPassCreateInfo<'_>,
    ) -> Result<vk::RenderPass> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::RenderPass)?;
        let attachments =
            raw_slice(create_info.p_attachments, create_info.attachment_count).to_vec();
        let subpasses = raw_slice(create_info.p_subpasses, create_info.subpass_count)
            .iter()
            .map(|subpass| SubpassRecord {
                bind_point: subpass.pipeline_bind_point,
                color: raw_slice(subpass.p_color_attachments, subpass.color_attachment_count)
                    .iter()
                    .map(|r| (r.attachment, r.layout))
                    .collect(),
                depth: subpass
                    .p_depth_stencil_attachment
                    .as_ref()
                    .map(|r| (r.attachment, r.layout)),
            })
            .collect();
        state.render_passes.push(RenderPassRecord {
            handle,
            attachments,
            subpasses,
            dependency_count: create_info.dependency_count,
        });
        Ok(vk::RenderPass::from_raw(handle))
    }

    unsafe fn create_framebuffer(
        &self,
        create_info: &vk::FramebufferCreateInfo<'_>,
    ) -> Result<vk::Framebuffer> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::Framebuffer)?;
        let attachments = raw_slice(create_info.p_attachments, create_info.attachment_count)
            .iter()
            .map(|view| view.as_raw())
            .collect();
        state.framebuffers.push(FramebufferRecord {
            handle,
            attachments,
            width: create_info.width,
            height: create_info.height,
        });
        Ok(vk::Framebuffer::from_raw(handle))
    }

    unsafe fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let mut state = self.state.lock();
        let handle = self.create(&mut state, ResourceKind::Fence)?;
        state.fences.insert(handle, signaled);
        Ok(vk::Fence::from_raw(handle))
    }

    unsafe fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let mut state = self.state.lock();
        self.create(&mut state, ResourceKind::Semaphore)
            .map(vk::Semaphore::from_raw)
    }

    unsafe fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        _timeout_ns: u64,
    ) -> Result<u32> {
        let mut state = self.state.lock();
        let count = state.swapchain_images.len();
        if count == 0 {
            return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR));
        }
        let index = state.next_image as u32;
        state.next_image = (state.next_image + 1) % count;
        state.record(Call::AcquireNextImage {
            index,
            semaphore: semaphore.as_raw(),
        });
        Ok(index)
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> Result<()> {
        let mut state = self.state.lock();
        let raw = fence.as_raw();
        let signaled = state.fences.get(&raw).copied().ok_or_else(|| {
            GpuError::InvalidState(format!("Wait on unknown fence {raw:#x}"))
        })?;
        state.record(Call::WaitForFence {
            fence: raw,
            blocked: !signaled,
        });
        if signaled {
            Ok(())
        } else {
            Err(GpuError::Vulkan(vk::Result::TIMEOUT))
        }
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        let mut state = self.state.lock();
        let raw = fence.as_raw();
        match state.fences.get_mut(&raw) {
            Some(signaled) => *signaled = false,
            None => {
                return Err(GpuError::InvalidState(format!(
                    "Reset of unknown fence {raw:#x}"
                )))
            }
        }
        state.record(Call::ResetFence(raw));
        Ok(())
    }

    unsafe fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        _flags: vk::CommandBufferUsageFlags,
    ) -> Result<()> {
        self.state
            .lock()
            .record(Call::BeginCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    unsafe fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        self.state
            .lock()
            .record(Call::EndCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo<'_>,
    ) {
        let clear_values = raw_slice(begin_info.p_clear_values, begin_info.clear_value_count);
        let clear_color = clear_values
            .first()
            .map_or([0.0; 4], |value| value.color.float32);
        let (clear_depth, clear_stencil) = clear_values
            .get(1)
            .map_or((0.0, 0), |value| {
                (value.depth_stencil.depth, value.depth_stencil.stencil)
            });
        let area = begin_info.render_area;

        self.state.lock().record(Call::BeginRenderPass {
            command_buffer: command_buffer.as_raw(),
            render_pass: begin_info.render_pass.as_raw(),
            framebuffer: begin_info.framebuffer.as_raw(),
            offset: (area.offset.x, area.offset.y),
            extent: area.extent,
            clear_color,
            clear_depth,
            clear_stencil,
        });
    }

    unsafe fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.state
            .lock()
            .record(Call::EndRenderPass(command_buffer.as_raw()));
    }

    unsafe fn queue_submit(&self, submit_info: &vk::SubmitInfo<'_>, fence: vk::Fence) -> Result<()> {
        let mut state = self.state.lock();
        let raw = fence.as_raw();
        match state.fences.get_mut(&raw) {
            Some(signaled) if *signaled => {
                return Err(GpuError::InvalidState(format!(
                    "Submit with signaled fence {raw:#x}"
                )))
            }
            // Work completes immediately
            Some(signaled) => *signaled = true,
            None if fence == vk::Fence::null() => {}
            None => {
                return Err(GpuError::InvalidState(format!(
                    "Submit with unknown fence {raw:#x}"
                )))
            }
        }

        let wait_count = submit_info.wait_semaphore_count;
        state.record(Call::Submit {
            command_buffers: raws(raw_slice(
                submit_info.p_command_buffers,
                submit_info.command_buffer_count,
            )),
            wait_semaphores: raws(raw_slice(submit_info.p_wait_semaphores, wait_count)),
            wait_stages: raw_slice(submit_info.p_wait_dst_stage_mask, wait_count).to_vec(),
            signal_semaphores: raws(raw_slice(
                submit_info.p_signal_semaphores,
                submit_info.signal_semaphore_count,
            )),
            fence: raw,
        });
        Ok(())
    }

    unsafe fn queue_present(&self, present_info: &vk::PresentInfoKHR<'_>) -> Result<()> {
        self.state.lock().record(Call::Present {
            image_indices: raw_slice(present_info.p_image_indices, present_info.swapchain_count)
                .to_vec(),
            wait_semaphores: raws(raw_slice(
                present_info.p_wait_semaphores,
                present_info.wait_semaphore_count,
            )),
        });
        Ok(())
    }

    unsafe fn device_wait_idle(&self) -> Result<()> {
        self.state.lock().record(Call::DeviceWaitIdle);
        Ok(())
    }

    unsafe fn destroy(&self, resource: &Resource) {
        let mut state = self.state.lock();
        let kind = resource.kind();
        let handles: Vec<u64> = match resource {
            Resource::CommandPool(h) => vec![h.as_raw()],
            Resource::CommandBuffers { buffers, .. } => raws(buffers),
            Resource::Swapchain(h) => vec![h.as_raw()],
            Resource::Image(h) => vec![h.as_raw()],
            Resource::Memory(h) => vec![h.as_raw()],
            Resource::ImageView(h) => vec![h.as_raw()],
            Resource::RenderPass(h) => vec![h.as_raw()],
            Resource::Framebuffer(h) => vec![h.as_raw()],
            Resource::Fence(h) => vec![h.as_raw()],
            Resource::Semaphore(h) => vec![h.as_raw()],
        };

        for &handle in &handles {
            if state.outstanding.remove(&handle) != Some(kind) {
                state.invalid_destroys += 1;
            }
            state.fences.remove(&handle);
        }
        let first = match resource {
            Resource::CommandBuffers { pool, .. } => pool.as_raw(),
            _ => handles.first().copied().unwrap_or_default(),
        };
        state.record(Call::Destroy(kind, first));
    }
}

impl Recorder {
    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.state.lock().calls.iter().position(pred)
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| pred(call)).count()
    }

    /// Handles created and not yet destroyed.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    /// Successful creations of one kind. Command buffers count individually.
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .map(|call| match call {
                Call::Create(k, _) if *k == kind => 1,
                Call::AllocateCommandBuffers { buffers, .. }
                    if kind == ResourceKind::CommandBuffers =>
                {
                    buffers.len()
                }
                _ => 0,
            })
            .sum()
    }

    /// Destroys of handles that were never created or already destroyed.
    pub fn invalid_destroys(&self) -> usize {
        self.state.lock().invalid_destroys
    }

    /// Fence waits that would have blocked forever.
    pub fn blocked_waits(&self) -> usize {
        self.count(|call| matches!(call, Call::WaitForFence { blocked: true, .. }))
    }

    pub fn swapchain_request(&self) -> Option<SwapchainRequest> {
        self.state.lock().swapchain_request
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.state.lock().images.clone()
    }

    /// `(memory handle, memory type index)` per allocation.
    pub fn allocations(&self) -> Vec<(u64, u32)> {
        self.state.lock().allocations.clone()
    }

    pub fn framebuffers(&self) -> Vec<FramebufferRecord> {
        self.state.lock().framebuffers.clone()
    }

    pub fn command_pools(&self) -> Vec<CommandPoolRecord> {
        self.state.lock().command_pools.clone()
    }

    pub fn render_passes(&self) -> Vec<RenderPassRecord> {
        self.state.lock().render_passes.clone()
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

fn raws<H: Handle + Copy>(handles: &[H]) -> Vec<u64> {
    handles.iter().map(|h| h.as_raw()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_signals_fence_and_reset_clears_it() {
        let driver = RecordingDriver::default();
        let recorder = driver.recorder();
        unsafe {
            let fence = driver.create_fence(false).unwrap();
            assert!(driver.wait_for_fence(fence, u64::MAX).is_err());
            assert_eq!(recorder.blocked_waits(), 1);

            driver
                .queue_submit(&vk::SubmitInfo::default(), fence)
                .unwrap();
            driver.wait_for_fence(fence, u64::MAX).unwrap();

            assert!(driver
                .queue_submit(&vk::SubmitInfo::default(), fence)
                .is_err());
            driver.reset_fence(fence).unwrap();
            driver
                .queue_submit(&vk::SubmitInfo::default(), fence)
                .unwrap();
        }
        assert_eq!(recorder.blocked_waits(), 1);
    }

    #[test]
    fn acquire_cycles_through_images() {
        let driver = RecordingDriver::new(MockConfig::default().with_swapchain_image_count(3));
        let info = vk::SwapchainCreateInfoKHR::default().min_image_count(2);
        let indices: Vec<u32> = unsafe {
            let swapchain = driver.create_swapchain(&info).unwrap();
            (0..4)
                .map(|_| {
                    driver
                        .acquire_next_image(swapchain, vk::Semaphore::null(), u64::MAX)
                        .unwrap()
                })
                .collect()
        };
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn fail_point_hits_only_the_nth_creation() {
        let driver =
            RecordingDriver::new(MockConfig::default().failing_on(ResourceKind::Semaphore, 1));
        let recorder = driver.recorder();
        unsafe {
            assert!(driver.create_semaphore().is_ok());
            assert!(driver.create_semaphore().is_err());
            assert!(driver.create_semaphore().is_ok());
        }
        assert_eq!(recorder.created(ResourceKind::Semaphore), 2);
        assert_eq!(recorder.outstanding(), 2);
    }

    #[test]
    fn destroy_tracks_outstanding_and_double_destroy() {
        let driver = RecordingDriver::default();
        let recorder = driver.recorder();
        unsafe {
            let semaphore = driver.create_semaphore().unwrap();
            assert_eq!(recorder.outstanding(), 1);
            driver.destroy(&Resource::Semaphore(semaphore));
            assert_eq!(recorder.outstanding(), 0);
            driver.destroy(&Resource::Semaphore(semaphore));
        }
        assert_eq!(recorder.invalid_destroys(), 1);
    }

    #[test]
    fn drop_records_shutdown() {
        let driver = RecordingDriver::default();
        let recorder = driver.recorder();
        drop(driver);
        assert_eq!(recorder.calls().last(), Some(&Call::Shutdown));
    }
}
