//! Demo application.

use ash::vk;
use tracing::info;
use vkframe_app::{AppContext, FrameApp, FrameContext};

/// Frames per full color cycle.
const CYCLE_FRAMES: u64 = 240;

pub struct Demo;

impl FrameApp for Demo {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        info!("Running on {}", ctx.driver().device_info().summary());
        info!(
            "{} extensions enabled, {} swapchain images, validation {}",
            ctx.driver().enabled_extensions().len(),
            ctx.image_count(),
            if ctx.driver().has_debug_messenger() { "on" } else { "off" }
        );
        Ok(Self)
    }

    fn draw(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()> {
        let attachments = [vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: cycle_color(frame.frame_number),
                },
            },
        }];
        let rects = [vk::ClearRect {
            rect: centered_rect(frame.extent),
            base_array_layer: 0,
            layer_count: 1,
        }];

        // SAFETY: the render pass is active on this command buffer
        unsafe {
            ctx.driver()
                .device()
                .cmd_clear_attachments(frame.command_buffer, &attachments, &rects);
        }
        Ok(())
    }
}

/// The middle half of the render area.
fn centered_rect(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D {
            x: (extent.width / 4) as i32,
            y: (extent.height / 4) as i32,
        },
        extent: vk::Extent2D {
            width: (extent.width / 2).max(1),
            height: (extent.height / 2).max(1),
        },
    }
}

/// Opaque color walking around the hue circle.
fn cycle_color(frame_number: u64) -> [f32; 4] {
    let t = (frame_number % CYCLE_FRAMES) as f32 / CYCLE_FRAMES as f32;
    let channel = |phase: f32| {
        let x = (t + phase).fract();
        (1.0 - (x * 3.0 - 1.5).abs()).clamp(0.0, 1.0)
    };
    [channel(0.0), channel(2.0 / 3.0), channel(1.0 / 3.0), 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_covers_middle_half() {
        let rect = centered_rect(vk::Extent2D {
            width: 640,
            height: 480,
        });
        assert_eq!((rect.offset.x, rect.offset.y), (160, 120));
        assert_eq!((rect.extent.width, rect.extent.height), (320, 240));
    }

    #[test]
    fn rect_never_empty() {
        let rect = centered_rect(vk::Extent2D {
            width: 1,
            height: 1,
        });
        assert_eq!((rect.extent.width, rect.extent.height), (1, 1));
    }

    #[test]
    fn color_cycle_repeats_and_stays_in_range() {
        assert_eq!(cycle_color(0), cycle_color(CYCLE_FRAMES));
        for frame in 0..CYCLE_FRAMES {
            let color = cycle_color(frame);
            assert!(color.iter().all(|c| (0.0..=1.0).contains(c)));
            assert_eq!(color[3], 1.0);
        }
    }
}
