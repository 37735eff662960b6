//! Device context: instance, surface, physical device, logical device and
//! graphics queue, plus the [`Driver`] implementation on top of them.

use crate::capabilities::{first_device, DeviceCandidate, DeviceSelector};
use crate::debug::DebugMessenger;
use crate::driver::{Driver, Resource};
use crate::error::{GpuError, Result};
use crate::instance::create_instance;
use crate::surface::SurfaceBinding;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr, CString};

/// Which device extensions to enable on the logical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionPolicy {
    /// Every extension the physical device reports.
    #[default]
    AllAvailable,
    /// Only `VK_KHR_swapchain`.
    RequiredOnly,
}

/// Main GPU context holding the bootstrap Vulkan objects.
pub struct DeviceContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
    surface: SurfaceBinding,
    physical_device: vk::PhysicalDevice,
    device_info: DeviceCandidate,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    graphics_queue_family: u32,
    graphics_queue: vk::Queue,
    enabled_extensions: Vec<String>,
}

impl DeviceContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Properties of the selected physical device.
    pub fn device_info(&self) -> &DeviceCandidate {
        &self.device_info
    }

    /// Device extensions enabled on the logical device.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// Whether validation messages are being routed to the log.
    pub fn has_debug_messenger(&self) -> bool {
        self.debug.is_some()
    }
}

impl Driver for DeviceContext {
    fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn surface_capabilities(&self) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.surface.capabilities(self.physical_device) }
    }

    fn surface_formats(&self) -> Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface.formats(self.physical_device) }
    }

    fn surface(&self) -> vk::SurfaceKHR {
        self.surface.surface
    }

    unsafe fn create_command_pool(
        &self,
        create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> Result<vk::CommandPool> {
        Ok(self.device.create_command_pool(create_info, None)?)
    }

    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> Result<Vec<vk::CommandBuffer>> {
        Ok(self.device.allocate_command_buffers(allocate_info)?)
    }

    unsafe fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> Result<vk::SwapchainKHR> {
        Ok(self.swapchain_loader.create_swapchain(create_info, None)?)
    }

    unsafe fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        Ok(self.swapchain_loader.get_swapchain_images(swapchain)?)
    }

    unsafe fn create_image(&self, create_info: &vk::ImageCreateInfo<'_>) -> Result<vk::Image> {
        Ok(self.device.create_image(create_info, None)?)
    }

    unsafe fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        self.device.get_image_memory_requirements(image)
    }

    unsafe fn allocate_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
    ) -> Result<vk::DeviceMemory> {
        Ok(self.device.allocate_memory(allocate_info, None)?)
    }

    unsafe fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> Result<()> {
        Ok(self.device.bind_image_memory(image, memory, 0)?)
    }

    unsafe fn create_image_view(
        &self,
        create_info: &vk::ImageViewCreateInfo<'_>,
    ) -> Result<vk::ImageView> {
        Ok(self.device.create_image_view(create_info, None)?)
    }

    unsafe fn create_render_pass(
        &self,
        create_info: &vk::RenderPassCreateInfo<'_>,
    ) -> Result<vk::RenderPass> {
        Ok(self.device.create_render_pass(create_info, None)?)
    }

    unsafe fn create_framebuffer(
        &self,
        create_info: &vk::FramebufferCreateInfo<'_>,
    ) -> Result<vk::Framebuffer> {
        Ok(self.device.create_framebuffer(create_info, None)?)
    }

    unsafe fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        Ok(self.device.create_fence(&create_info, None)?)
    }

    unsafe fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        Ok(self.device.create_semaphore(&create_info, None)?)
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<u32> {
        let (index, suboptimal) = self.swapchain_loader.acquire_next_image(
            swapchain,
            timeout_ns,
            semaphore,
            vk::Fence::null(),
        )?;
        if suboptimal {
            tracing::trace!("Acquired image {index} is suboptimal for the surface");
        }
        Ok(index)
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
        Ok(self.device.wait_for_fences(&[fence], true, timeout_ns)?)
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        Ok(self.device.reset_fences(&[fence])?)
    }

    unsafe fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        Ok(self
            .device
            .begin_command_buffer(command_buffer, &begin_info)?)
    }

    unsafe fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<()> {
        Ok(self.device.end_command_buffer(command_buffer)?)
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo<'_>,
    ) {
        self.device
            .cmd_begin_render_pass(command_buffer, begin_info, vk::SubpassContents::INLINE);
    }

    unsafe fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.device.cmd_end_render_pass(command_buffer);
    }

    unsafe fn queue_submit(&self, submit_info: &vk::SubmitInfo<'_>, fence: vk::Fence) -> Result<()> {
        Ok(self
            .device
            .queue_submit(self.graphics_queue, std::slice::from_ref(submit_info), fence)?)
    }

    unsafe fn queue_present(&self, present_info: &vk::PresentInfoKHR<'_>) -> Result<()> {
        let suboptimal = self
            .swapchain_loader
            .queue_present(self.graphics_queue, present_info)?;
        if suboptimal {
            tracing::trace!("Presented swapchain is suboptimal for the surface");
        }
        Ok(())
    }

    unsafe fn device_wait_idle(&self) -> Result<()> {
        Ok(self.device.device_wait_idle()?)
    }

    unsafe fn destroy(&self, resource: &Resource) {
        match resource {
            Resource::CommandPool(pool) => self.device.destroy_command_pool(*pool, None),
            Resource::CommandBuffers { pool, buffers } => {
                self.device.free_command_buffers(*pool, buffers)
            }
            Resource::Swapchain(swapchain) => {
                self.swapchain_loader.destroy_swapchain(*swapchain, None)
            }
            Resource::Image(image) => self.device.destroy_image(*image, None),
            Resource::Memory(memory) => self.device.free_memory(*memory, None),
            Resource::ImageView(view) => self.device.destroy_image_view(*view, None),
            Resource::RenderPass(render_pass) => self.device.destroy_render_pass(*render_pass, None),
            Resource::Framebuffer(framebuffer) => {
                self.device.destroy_framebuffer(*framebuffer, None)
            }
            Resource::Fence(fence) => self.device.destroy_fence(*fence, None),
            Resource::Semaphore(semaphore) => self.device.destroy_semaphore(*semaphore, None),
        }
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Surface, device, debug hooks, instance
            self.surface.destroy();
            self.device.destroy_device(None);
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("Device context destroyed");
    }
}

/// Builder for creating a device context.
pub struct DeviceContextBuilder {
    app_name: String,
    enable_validation: bool,
    device_selector: DeviceSelector,
    extension_policy: ExtensionPolicy,
}

impl Default for DeviceContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "vkframe".to_string(),
            enable_validation: cfg!(debug_assertions),
            device_selector: Box::new(first_device),
            extension_policy: ExtensionPolicy::default(),
        }
    }
}

impl DeviceContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Choose the physical device. Defaults to the first enumerated one.
    pub fn device_selector(
        mut self,
        selector: impl Fn(&[DeviceCandidate]) -> Option<usize> + 'static,
    ) -> Self {
        self.device_selector = Box::new(selector);
        self
    }

    /// Choose which device extensions get enabled.
    pub fn extension_policy(mut self, policy: ExtensionPolicy) -> Self {
        self.extension_policy = policy;
        self
    }

    /// Build the device context for `window`.
    ///
    /// On failure every object created so far is destroyed again.
    pub fn build<W>(self, window: &W) -> Result<DeviceContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?
            .as_raw();

        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Loading(format!("Failed to load Vulkan: {e}")))?;

        let setup =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation) }?;
        let mut partial = PartialContext {
            entry,
            instance: setup.instance,
            debug: None,
            surface: None,
            armed: true,
        };

        if setup.debug_utils {
            match unsafe { DebugMessenger::new(&partial.entry, &partial.instance) } {
                Ok(debug) => partial.debug = Some(debug),
                Err(e) => tracing::warn!("Debug messenger unavailable: {e}"),
            }
        }

        let surface = unsafe {
            SurfaceBinding::new(&partial.entry, &partial.instance, display, window_handle)
        }?;
        let surface = partial.surface.insert(surface).clone();

        // Select physical device
        let physical_devices = unsafe { partial.instance.enumerate_physical_devices() }?;
        let candidates: Vec<DeviceCandidate> = physical_devices
            .iter()
            .map(|&pd| unsafe { DeviceCandidate::query(&partial.instance, pd) })
            .collect();
        let device_info = (self.device_selector)(&candidates)
            .and_then(|index| candidates.get(index))
            .cloned()
            .ok_or(GpuError::NoSuitableDevice)?;
        let physical_device = device_info.handle;

        tracing::info!("Selected GPU: {}", device_info.summary());

        let graphics_queue_family = device_info
            .graphics_queue_family()
            .ok_or_else(|| GpuError::NoGraphicsQueue(device_info.device_name.clone()))?;
        if !unsafe { surface.supports_present(physical_device, graphics_queue_family) }? {
            return Err(GpuError::PresentationUnsupported(graphics_queue_family));
        }

        let memory_properties = unsafe {
            partial
                .instance
                .get_physical_device_memory_properties(physical_device)
        };

        let extensions =
            unsafe { device_extensions(&partial.instance, physical_device, self.extension_policy) }?;
        let device = unsafe {
            create_device(
                &partial.instance,
                physical_device,
                graphics_queue_family,
                &extensions,
            )
        }?;
        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let swapchain_loader = ash::khr::swapchain::Device::new(&partial.instance, &device);

        tracing::info!(
            "Logical device created: queue family {}, {} extensions",
            graphics_queue_family,
            extensions.len()
        );

        let (entry, instance, debug) = partial.disarm();
        let enabled_extensions = extensions
            .iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(DeviceContext {
            entry,
            instance,
            debug,
            surface,
            physical_device,
            device_info,
            memory_properties,
            device,
            swapchain_loader,
            graphics_queue_family,
            graphics_queue,
            enabled_extensions,
        })
    }
}

/// Bootstrap objects owned while the context is still being built.
///
/// Dropping it while armed destroys whatever was created, in reverse order.
struct PartialContext {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
    surface: Option<SurfaceBinding>,
    armed: bool,
}

impl PartialContext {
    /// Hand ownership over to the finished context.
    fn disarm(&mut self) -> (ash::Entry, ash::Instance, Option<DebugMessenger>) {
        self.armed = false;
        (self.entry.clone(), self.instance.clone(), self.debug.take())
    }
}

impl Drop for PartialContext {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!("Unwinding partially built device context");
        unsafe {
            if let Some(surface) = self.surface.take() {
                surface.destroy();
            }
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Device extensions to enable under `policy`.
///
/// `VK_KHR_swapchain` must be among the available ones either way.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn device_extensions(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    policy: ExtensionPolicy,
) -> Result<Vec<CString>> {
    let available: Vec<CString> = instance
        .enumerate_device_extension_properties(physical_device)?
        .iter()
        .map(|props| CStr::from_ptr(props.extension_name.as_ptr()).to_owned())
        .collect();

    let swapchain = ash::khr::swapchain::NAME;
    if !available.iter().any(|name| name.as_c_str() == swapchain) {
        return Err(GpuError::ExtensionNotSupported(
            swapchain.to_string_lossy().into_owned(),
        ));
    }

    Ok(match policy {
        ExtensionPolicy::RequiredOnly => vec![swapchain.to_owned()],
        ExtensionPolicy::AllAvailable => available,
    })
}

/// Create the logical device with a single graphics queue.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
    extensions: &[CString],
) -> Result<ash::Device> {
    let queue_priority = 1.0_f32;
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(std::slice::from_ref(&queue_priority))];

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names);

    Ok(instance.create_device(physical_device, &device_create_info, None)?)
}
