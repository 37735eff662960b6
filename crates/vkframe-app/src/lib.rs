//! Frame harness for vkframe.
//!
//! This crate drives the per-frame loop on top of `vkframe-gpu`:
//! - Swapchain, depth target, render pass and per-image resources
//! - Fence- and semaphore-gated frame loop, one frame in flight
//! - Initialize / render / terminate lifecycle with full teardown
//! - Window and event loop handling
//!
//! # Example
//!
//! ```no_run
//! use vkframe_app::{run_app, AppConfig, AppContext, FrameApp, FrameContext};
//!
//! struct MyApp;
//!
//! impl FrameApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn draw(&mut self, _ctx: &AppContext, _frame: &FrameContext) -> anyhow::Result<()> {
//!         // Record draw commands; the render pass is already active
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default())
//! }
//! ```

mod app;
mod context;
mod frame;
mod lifecycle;
mod runner;

pub use app::FrameApp;
pub use context::{AppContext, RenderConfig, DEFAULT_CLEAR_COLOR};
pub use frame::FrameContext;
pub use lifecycle::{Harness, LifecycleState};
pub use runner::{init_logging, run_app, AppConfig};

// Re-export commonly used types for convenience
pub use vkframe_gpu::{DeviceContext, DeviceContextBuilder, Driver, GpuError};
pub use winit::event::WindowEvent;
