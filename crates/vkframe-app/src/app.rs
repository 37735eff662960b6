//! `FrameApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;
use vkframe_gpu::{DeviceContext, Driver};
use winit::event::WindowEvent;

/// Trait for applications driven by the frame harness.
///
/// The harness owns the device, swapchain and per-image resources; an
/// application only records draw commands into the render pass the harness
/// has already begun.
pub trait FrameApp<D: Driver = DeviceContext>: Sized {
    /// Initialize the application.
    ///
    /// Called once at the end of initialization, after every harness
    /// resource exists.
    fn init(ctx: &mut AppContext<D>) -> anyhow::Result<Self>;

    /// Record draw commands for one frame.
    ///
    /// Called once per frame inside the active render pass.
    fn draw(&mut self, ctx: &AppContext<D>, frame: &FrameContext) -> anyhow::Result<()>;

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed
    /// further. Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Release application resources before the harness tears down.
    ///
    /// The device is idle when this is called.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext<D>) {}
}
