//! Platform abstraction for vkframe.
//!
//! Provides window creation via winit. The window is fixed-size: the
//! swapchain is created once and never rebuilt.

use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Window configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vkframe".to_string(),
            width: 640,
            height: 480,
            resizable: false,
        }
    }
}

impl WindowConfig {
    /// Window attributes for this configuration.
    pub fn attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(self.resizable)
    }
}

/// Create a window on a running event loop.
pub fn create_window(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Window> {
    let window = event_loop
        .create_window(config.attributes())
        .map_err(|e| PlatformError::WindowCreation(e.to_string()))?;

    tracing::info!(
        "Window created: \"{}\" {}x{}",
        config.title,
        config.width,
        config.height
    );
    Ok(window)
}

/// Current drawable size of the window in physical pixels.
pub fn window_extent(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}
