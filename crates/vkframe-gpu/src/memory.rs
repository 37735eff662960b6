//! Device memory allocation for images.

use crate::capabilities::find_memory_type_index;
use crate::driver::{Driver, Resource};
use crate::error::Result;
use crate::stack::ResourceStack;
use ash::vk;

/// Allocate memory for `image` with the given properties and bind it.
///
/// The memory type is resolved before anything is allocated, so an
/// unsatisfiable request fails without touching the device.
///
/// # Safety
/// The image must belong to the driver and must not be bound yet.
pub unsafe fn allocate_image_memory<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    image: vk::Image,
    properties: vk::MemoryPropertyFlags,
) -> Result<vk::DeviceMemory> {
    let requirements = driver.image_memory_requirements(image);
    let memory_type_index = find_memory_type_index(
        driver.memory_properties(),
        requirements.memory_type_bits,
        properties,
    )?;

    tracing::debug!(
        "Allocating {} bytes for image from memory type {}",
        requirements.size,
        memory_type_index
    );

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = driver.allocate_memory(&alloc_info)?;
    stack.push(Resource::Memory(memory));

    driver.bind_image_memory(image, memory)?;

    Ok(memory)
}
