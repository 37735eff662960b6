//! Synchronization primitives.

use crate::driver::{Driver, Resource};
use crate::error::Result;
use crate::stack::ResourceStack;
use ash::vk;

/// Create a semaphore and track it.
///
/// # Safety
/// The driver must be valid.
pub unsafe fn create_semaphore<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
) -> Result<vk::Semaphore> {
    let semaphore = driver.create_semaphore()?;
    stack.push(Resource::Semaphore(semaphore));
    Ok(semaphore)
}

/// Create a fence and track it.
///
/// # Safety
/// The driver must be valid.
pub unsafe fn create_fence<D: Driver + ?Sized>(
    driver: &D,
    stack: &mut ResourceStack,
    signaled: bool,
) -> Result<vk::Fence> {
    let fence = driver.create_fence(signaled)?;
    stack.push(Resource::Fence(fence));
    Ok(fence)
}

/// Semaphores shared by every frame.
///
/// With a single frame in flight one pair is enough: the next acquire cannot
/// be issued before the previous frame's present has been queued.
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signaled when the presentation engine releases the acquired image.
    pub present_completed: vk::Semaphore,
    /// Signaled when the frame's command buffer has finished executing.
    pub render_completed: vk::Semaphore,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// # Safety
    /// The driver must be valid.
    pub unsafe fn new<D: Driver + ?Sized>(driver: &D, stack: &mut ResourceStack) -> Result<Self> {
        Ok(Self {
            present_completed: create_semaphore(driver, stack)?,
            render_completed: create_semaphore(driver, stack)?,
        })
    }
}
