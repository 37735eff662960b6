//! Vulkan instance creation.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Validation layer enabled when validation is requested.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// A created instance and the optional features that made it in.
pub struct InstanceSetup {
    pub instance: ash::Instance,
    /// `VK_EXT_debug_utils` was enabled.
    pub debug_utils: bool,
}

/// Create a Vulkan instance able to present to `display`.
///
/// Validation layer and debug-utils extension are enabled only when requested
/// and present on the host; missing ones are logged and skipped.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<InstanceSetup> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::InvalidState(format!("Invalid application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"vkframe")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_1);

    // Surface extensions for this platform
    let mut extension_names: Vec<*const c_char> =
        ash_window::enumerate_required_extensions(display)?.to_vec();

    #[cfg(target_os = "macos")]
    extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());

    let debug_utils =
        enable_validation && instance_extension_available(entry, ash::ext::debug_utils::NAME)?;
    if debug_utils {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    } else if enable_validation {
        tracing::warn!("VK_EXT_debug_utils not available, validation messages will not be logged");
    }

    let layer_names: Vec<*const c_char> =
        if enable_validation && layer_available(entry, VALIDATION_LAYER)? {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            if enable_validation {
                tracing::warn!(
                    "Validation layer {} not available",
                    VALIDATION_LAYER.to_string_lossy()
                );
            }
            vec![]
        };

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = entry.create_instance(&create_info, None)?;

    Ok(InstanceSetup {
        instance,
        debug_utils,
    })
}

unsafe fn layer_available(entry: &ash::Entry, name: &CStr) -> Result<bool> {
    let available = entry.enumerate_instance_layer_properties()?;
    Ok(available
        .iter()
        .any(|props| CStr::from_ptr(props.layer_name.as_ptr()) == name))
}

unsafe fn instance_extension_available(entry: &ash::Entry, name: &CStr) -> Result<bool> {
    let available = entry.enumerate_instance_extension_properties(None)?;
    Ok(available
        .iter()
        .any(|props| CStr::from_ptr(props.extension_name.as_ptr()) == name))
}
