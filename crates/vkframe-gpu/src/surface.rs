//! Presentation surface.
//!
//! Surface creation itself is delegated to `ash-window`; this module only
//! keeps the handle and answers capability queries about it.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// A window surface and its extension loader.
#[derive(Clone)]
pub struct SurfaceBinding {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
}

impl SurfaceBinding {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The handles must refer to a live window that outlives the surface, and
    /// the instance must have the platform surface extensions enabled.
    pub unsafe fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self> {
        let surface = ash_window::create_surface(entry, instance, display, window, None)
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;
        let surface_loader = ash::khr::surface::Instance::new(entry, instance);

        Ok(Self {
            surface,
            surface_loader,
        })
    }

    /// Query surface capabilities.
    ///
    /// # Safety
    /// The physical device must come from the instance the surface was made on.
    pub unsafe fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        Ok(self
            .surface_loader
            .get_physical_device_surface_capabilities(physical_device, self.surface)?)
    }

    /// Query supported surface formats.
    ///
    /// # Safety
    /// The physical device must come from the instance the surface was made on.
    pub unsafe fn formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>> {
        Ok(self
            .surface_loader
            .get_physical_device_surface_formats(physical_device, self.surface)?)
    }

    /// Whether `queue_family` can present to this surface.
    ///
    /// # Safety
    /// The physical device must come from the instance the surface was made on.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        Ok(self.surface_loader.get_physical_device_surface_support(
            physical_device,
            queue_family,
            self.surface,
        )?)
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// The surface must not be in use and its swapchain must be destroyed.
    pub unsafe fn destroy(&self) {
        self.surface_loader.destroy_surface(self.surface, None);
    }
}
