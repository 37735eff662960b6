//! Swapchain management.

use crate::capabilities::select_surface_format;
use crate::command::allocate_command_buffers;
use crate::driver::{Driver, Resource};
use crate::error::{GpuError, Result};
use crate::stack::ResourceStack;
use crate::sync::create_fence;
use ash::vk;

/// Swapchain creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Color format to negotiate with the surface.
    pub preferred_format: vk::Format,
    /// Presentation mode. FIFO is always supported.
    pub present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            preferred_format: vk::Format::B8G8R8A8_UNORM,
            present_mode: vk::PresentModeKHR::FIFO,
        }
    }
}

/// Swapchain wrapper.
#[derive(Debug, Clone)]
pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the driver's surface.
    ///
    /// `window_extent` is only called when the surface leaves the extent up
    /// to the application.
    ///
    /// # Safety
    /// The driver must be valid and the surface must not have a swapchain.
    pub unsafe fn new<D: Driver + ?Sized>(
        driver: &D,
        stack: &mut ResourceStack,
        config: &SwapchainConfig,
        window_extent: impl FnOnce() -> vk::Extent2D,
    ) -> Result<Self> {
        let capabilities = driver.surface_capabilities()?;
        let format = select_surface_format(&driver.surface_formats()?, config.preferred_format)?;
        let image_count = image_count(&capabilities);
        let extent = calculate_extent(&capabilities, window_extent);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(driver.surface())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = driver
            .create_swapchain(&create_info)
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;
        stack.push(Resource::Swapchain(swapchain));

        // The driver may hand out more images than requested.
        let images = driver.swapchain_images(swapchain)?;
        if images.is_empty() {
            return Err(GpuError::SwapchainCreation(
                "Swapchain has no images".to_string(),
            ));
        }

        let image_views =
            crate::resources::create_color_views(driver, stack, &images, format.format)?;

        tracing::info!(
            "Swapchain created: {}x{} {:?} ({} images, {} requested, {:?})",
            extent.width,
            extent.height,
            format.format,
            images.len(),
            image_count,
            config.present_mode
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            format,
            extent,
        })
    }

    /// Number of images actually in the chain.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Acquire the next image, signaling `semaphore` when it is available.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire_next_image<D: Driver + ?Sized>(
        &self,
        driver: &D,
        semaphore: vk::Semaphore,
    ) -> Result<u32> {
        driver.acquire_next_image(self.swapchain, semaphore, u64::MAX)
    }

    /// Present an image once `wait_semaphore` is signaled.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present<D: Driver + ?Sized>(
        &self,
        driver: &D,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        driver.queue_present(&present_info)
    }
}

/// Per-image resources, indexed by swapchain image index.
///
/// `framebuffers`, `command_buffers` and `fences` always have the same length
/// and entry `i` of each belongs to swapchain image `i`.
#[derive(Debug, Clone)]
pub struct PerImageResources {
    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
    fences: Vec<vk::Fence>,
}

impl PerImageResources {
    /// Allocate one command buffer and one signaled fence per framebuffer.
    ///
    /// Fences start signaled so the first wait on each returns immediately.
    ///
    /// # Safety
    /// The pool and framebuffers must belong to the driver.
    pub unsafe fn new<D: Driver + ?Sized>(
        driver: &D,
        stack: &mut ResourceStack,
        pool: vk::CommandPool,
        framebuffers: Vec<vk::Framebuffer>,
    ) -> Result<Self> {
        let count = framebuffers.len() as u32;
        let command_buffers = allocate_command_buffers(driver, stack, pool, count)?;

        let fences = (0..count)
            .map(|_| create_fence(driver, stack, true))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            framebuffers,
            command_buffers,
            fences,
        })
    }

    /// Number of images covered.
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether no image is covered.
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Framebuffer, command buffer and fence for image `index`.
    pub fn get(&self, index: u32) -> Result<(vk::Framebuffer, vk::CommandBuffer, vk::Fence)> {
        let i = index as usize;
        match (
            self.framebuffers.get(i),
            self.command_buffers.get(i),
            self.fences.get(i),
        ) {
            (Some(&fb), Some(&cmd), Some(&fence)) => Ok((fb, cmd, fence)),
            _ => Err(GpuError::InvalidState(format!(
                "Image index {index} out of range for {} images",
                self.len()
            ))),
        }
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }

    pub fn fences(&self) -> &[vk::Fence] {
        &self.fences
    }
}

/// Number of images to request: at least two, and at least the surface
/// minimum.
pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    capabilities.min_image_count.max(2)
}

/// Calculate swapchain extent.
///
/// A current extent of `u32::MAX` means the surface takes its size from the
/// swapchain; the window size is used then, kept within the surface limits.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: impl FnOnce() -> vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let desired = window_extent();
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: desired.width.min(max.width).max(min.width),
        height: desired.height.min(max.height).max(min.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min_image_count: u32, current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count,
            max_image_count: 8,
            current_extent: current,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    const UNDEFINED_EXTENT: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    #[test]
    fn image_count_is_at_least_two() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(image_count(&capabilities(0, extent)), 2);
        assert_eq!(image_count(&capabilities(1, extent)), 2);
        assert_eq!(image_count(&capabilities(2, extent)), 2);
        assert_eq!(image_count(&capabilities(3, extent)), 3);
    }

    #[test]
    fn current_extent_wins_without_querying_window() {
        let current = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = calculate_extent(&capabilities(2, current), || {
            panic!("window must not be queried")
        });
        assert_eq!(extent, current);
    }

    #[test]
    fn undefined_extent_falls_back_to_window() {
        let extent = calculate_extent(&capabilities(2, UNDEFINED_EXTENT), || vk::Extent2D {
            width: 640,
            height: 480,
        });
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn window_extent_is_kept_within_surface_limits() {
        let extent = calculate_extent(&capabilities(2, UNDEFINED_EXTENT), || vk::Extent2D {
            width: 10_000,
            height: 0,
        });
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 4096,
                height: 1
            }
        );
    }
}
