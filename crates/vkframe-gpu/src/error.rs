//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant is fatal for the harness: nothing here is retried.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// No physical device was accepted by the device selector.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// The selected physical device has no graphics-capable queue family.
    #[error("No graphics-capable queue family on {0}")]
    NoGraphicsQueue(String),

    /// The graphics queue family cannot present to the surface.
    #[error("Queue family {0} cannot present to the surface")]
    PresentationUnsupported(u32),

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// The surface does not offer the requested color format.
    #[error("Surface format {0:?} is not supported by the surface")]
    SurfaceFormatUnavailable(vk::Format),

    /// No memory type satisfies both the resource mask and the property flags.
    #[error("No memory type in mask {type_bits:#b} has properties {properties:?}")]
    NoMatchingMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
