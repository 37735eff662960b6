//! Application runner and event loop.

use ash::vk;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vkframe_gpu::{DeviceContext, DeviceContextBuilder, SwapchainConfig};
use vkframe_platform::{create_window, window_extent, WindowConfig};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::FrameApp;
use crate::context::{RenderConfig, DEFAULT_CLEAR_COLOR};
use crate::lifecycle::Harness;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Window width.
    pub width: u32,
    /// Window height.
    pub height: u32,
    /// Swapchain present mode.
    pub present_mode: vk::PresentModeKHR,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Color format to negotiate with the surface.
    pub preferred_format: vk::Format,
    /// Clear color of the color attachment.
    pub clear_color: [f32; 4],
    /// Exit after this many frames (None to run until closed).
    pub frame_limit: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "vkframe".to_string(),
            width: 640,
            height: 480,
            present_mode: vk::PresentModeKHR::FIFO,
            validation: cfg!(debug_assertions),
            preferred_format: vk::Format::B8G8R8A8_UNORM,
            clear_color: DEFAULT_CLEAR_COLOR,
            frame_limit: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the present mode.
    pub fn with_present_mode(mut self, present_mode: vk::PresentModeKHR) -> Self {
        self.present_mode = present_mode;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the preferred surface format.
    pub fn with_preferred_format(mut self, format: vk::Format) -> Self {
        self.preferred_format = format;
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    /// Stop after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Window part of the configuration.
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: false,
        }
    }

    /// Rendering part of the configuration.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            swapchain: SwapchainConfig {
                preferred_format: self.preferred_format,
                present_mode: self.present_mode,
            },
            clear_color: self.clear_color,
        }
    }
}

/// Run a `FrameApp` with the given configuration.
///
/// Initializes logging, creates the window and device context, and renders
/// until the window is closed or the frame limit is reached. Any failure
/// tears the harness down and is returned.
pub fn run_app<A: FrameApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    init_logging();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        error: None,
    };

    let loop_result = event_loop.run_app(&mut runner);

    // The loop may end without a close request
    if let Some(state) = runner.state.take() {
        runner.record(state.shutdown());
    }
    if let Err(e) = loop_result {
        error!("Event loop error: {e}");
        runner.record(Err(e.into()));
    }

    match runner.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Install the `tracing` subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: FrameApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
    /// First fatal error.
    error: Option<anyhow::Error>,
}

/// Internal application state.
struct AppState<A: FrameApp> {
    // Declared first so the surface is gone before the window
    harness: Harness<A, DeviceContext>,
    window: Window,
}

impl<A: FrameApp> AppState<A> {
    fn shutdown(self) -> anyhow::Result<()> {
        let Self { harness, window } = self;
        let result = harness.terminate();
        drop(window);
        result
    }
}

impl<A: FrameApp> AppRunner<A> {
    fn record(&mut self, result: anyhow::Result<()>) {
        if let Err(e) = result {
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window = create_window(event_loop, &self.config.window_config())?;

        let device = DeviceContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build(&window)?;

        let harness = Harness::initialize(device, &self.config.render_config(), || {
            let (width, height) = window_extent(&window);
            vk::Extent2D { width, height }
        })?;

        Ok(AppState { harness, window })
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            let result = state.shutdown();
            self.record(result);
        }
        event_loop.exit();
    }
}

impl<A: FrameApp> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.error.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.harness.app_mut().on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.exit(event_loop);
            }
            WindowEvent::RedrawRequested => {
                let Some(state) = &mut self.state else {
                    return;
                };
                if let Err(e) = state.harness.render() {
                    error!("Render error: {e:#}");
                    self.record(Err(e));
                    self.exit(event_loop);
                    return;
                }

                let done = self
                    .config
                    .frame_limit
                    .is_some_and(|limit| state.harness.frame_count() >= limit);
                if done {
                    info!("Frame limit reached");
                    self.exit(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_fixed_640_by_480_fifo() {
        let config = AppConfig::default();
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(config.preferred_format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(config.frame_limit, None);
        assert!(!config.window_config().resizable);
    }

    #[test]
    fn render_config_carries_swapchain_settings() {
        let render = AppConfig::new("test")
            .with_present_mode(vk::PresentModeKHR::MAILBOX)
            .with_preferred_format(vk::Format::R8G8B8A8_UNORM)
            .with_clear_color([1.0, 0.0, 0.0, 1.0])
            .render_config();

        assert_eq!(render.swapchain.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(render.swapchain.preferred_format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(render.clear_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn window_config_carries_title_and_size() {
        let window = AppConfig::new("demo").with_size(800, 600).window_config();
        assert_eq!(window.title, "demo");
        assert_eq!((window.width, window.height), (800, 600));
    }
}
