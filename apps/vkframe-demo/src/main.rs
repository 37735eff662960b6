//! vkframe demo
//!
//! Opens a fixed 640x480 window, clears it every frame and fills a centered
//! rectangle whose color slowly cycles.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vkframe-demo
//! ```
//!
//! ## Options
//!
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use vkframe_app::{run_app, AppConfig};

use crate::app::Demo;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const TITLE: &str = "vkframe demo";

fn main() -> anyhow::Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    run_app::<Demo>(AppConfig::new(TITLE).with_size(WIDTH, HEIGHT))
}

fn print_help() {
    eprintln!(
        "vkframe demo

Clears a {WIDTH}x{HEIGHT} window and draws a color-cycling rectangle until
the window is closed.

USAGE:
    vkframe-demo [OPTIONS]

OPTIONS:
    -h, --help    Print this help message

ENVIRONMENT:
    RUST_LOG      Log filter (default: info)"
    );
}
