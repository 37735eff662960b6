//! Command pool and command buffer management.

use crate::driver::{Driver, Resource};
use crate::error::{GpuError, Result};
use crate::stack::ResourceStack;
use ash::vk;

/// Create a command pool on the graphics queue family.
///
/// The pool allows individual buffer resets because every frame re-records
/// its buffer in place.
///
/// # Safety
/// The driver must be valid.
pub unsafe fn create_command_pool<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
) -> Result<vk::CommandPool> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(driver.graphics_queue_family())
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    let pool = driver.create_command_pool(&create_info)?;
    stack.push(Resource::CommandPool(pool));
    Ok(pool)
}

/// Allocate `count` primary command buffers from `pool`.
///
/// # Safety
/// The pool must belong to the driver.
pub unsafe fn allocate_command_buffers<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    let buffers = driver.allocate_command_buffers(&alloc_info)?;
    stack.push(Resource::CommandBuffers {
        pool,
        buffers: buffers.clone(),
    });

    if buffers.len() != count as usize {
        return Err(GpuError::InvalidState(format!(
            "Requested {count} command buffers, got {}",
            buffers.len()
        )));
    }

    Ok(buffers)
}

/// Begin recording a command buffer.
///
/// # Safety
/// The command buffer must not be pending execution.
pub unsafe fn begin_command_buffer<D: Driver + ?Sized>(
    driver: &D,
    cmd: vk::CommandBuffer,
) -> Result<()> {
    driver.begin_command_buffer(cmd, vk::CommandBufferUsageFlags::empty())
}

/// End recording a command buffer.
///
/// # Safety
/// The command buffer must be recording.
pub unsafe fn end_command_buffer<D: Driver + ?Sized>(
    driver: &D,
    cmd: vk::CommandBuffer,
) -> Result<()> {
    driver.end_command_buffer(cmd)
}

/// Submit one command buffer to the graphics queue.
///
/// # Safety
/// All handles must be valid and `fence` must be unsignaled.
pub unsafe fn submit_command_buffer<D: Driver + ?Sized>(
    driver: &D,
    cmd: vk::CommandBuffer,
    wait_semaphore: vk::Semaphore,
    wait_stage: vk::PipelineStageFlags,
    signal_semaphore: vk::Semaphore,
    fence: vk::Fence,
) -> Result<()> {
    let command_buffers = [cmd];
    let wait_semaphores = [wait_semaphore];
    let wait_stages = [wait_stage];
    let signal_semaphores = [signal_semaphore];

    let submit_info = vk::SubmitInfo::default()
        .command_buffers(&command_buffers)
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .signal_semaphores(&signal_semaphores);

    driver.queue_submit(&submit_info, fence)
}
