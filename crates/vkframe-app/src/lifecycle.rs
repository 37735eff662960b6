//! Harness lifecycle: initialize, render any number of frames, terminate.
//!
//! The lifecycle is carried by the value itself. A [`Harness`] only exists
//! once initialization has fully succeeded, and [`Harness::terminate`]
//! consumes it, so rendering before initialization or after termination
//! cannot be expressed. Dropping a harness that was never terminated runs
//! the same teardown.

use ash::vk;
use vkframe_gpu::{DeviceContext, Driver};

use crate::app::FrameApp;
use crate::context::{AppContext, RenderConfig};

/// Where a live harness is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Initialized, no frame rendered yet.
    Initialized,
    /// At least one frame rendered.
    Rendering,
    /// A frame failed; only termination is left.
    Failed,
    /// Torn down.
    Terminated,
}

/// An application together with the frame resources it draws into.
pub struct Harness<A, D = DeviceContext>
where
    A: FrameApp<D>,
    D: Driver,
{
    // Dropped before the context
    app: A,
    ctx: AppContext<D>,
    state: LifecycleState,
}

impl<A, D> Harness<A, D>
where
    A: FrameApp<D>,
    D: Driver,
{
    /// Build the frame resources on `driver`, then run the application's
    /// setup hook.
    ///
    /// If anything fails, whatever was created is destroyed (and the driver
    /// dropped) before the error is returned.
    pub fn initialize(
        driver: D,
        config: &RenderConfig,
        window_extent: impl FnOnce() -> vk::Extent2D,
    ) -> anyhow::Result<Self> {
        let mut ctx = AppContext::new(driver, config, window_extent)?;
        // On error `ctx` drops here, which waits idle and unwinds
        let app = A::init(&mut ctx)?;

        tracing::info!(
            "Harness initialized: {}x{}, {} images",
            ctx.extent().width,
            ctx.extent().height,
            ctx.image_count()
        );

        Ok(Self {
            app,
            ctx,
            state: LifecycleState::Initialized,
        })
    }

    /// Render one frame, calling the application's draw hook inside the
    /// render pass.
    ///
    /// A failed frame moves the harness to [`LifecycleState::Failed`]; every
    /// later call returns an error without rendering.
    pub fn render(&mut self) -> anyhow::Result<()> {
        let app = &mut self.app;
        match self.ctx.render_frame(|ctx, frame| app.draw(ctx, frame)) {
            Ok(()) => {
                self.state = LifecycleState::Rendering;
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Failed;
                Err(e)
            }
        }
    }

    /// Tear everything down.
    ///
    /// Waits for the device to go idle, runs the application's cleanup hook,
    /// destroys every frame object in reverse creation order and finally
    /// drops the driver. The idle-wait error, if any, is returned after the
    /// teardown has completed.
    pub fn terminate(mut self) -> anyhow::Result<()> {
        let result = self.shutdown();
        drop(self);
        tracing::info!("Harness terminated");
        result
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn context(&self) -> &AppContext<D> {
        &self.ctx
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.ctx.frame_count
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        if self.state == LifecycleState::Terminated {
            return Ok(());
        }
        self.state = LifecycleState::Terminated;

        tracing::info!("Shutting down after {} frames", self.ctx.frame_count);

        // Teardown continues even if the wait fails
        let idle = self.ctx.wait_idle();
        if let Err(e) = &idle {
            tracing::error!("Failed to wait idle: {e}");
        }

        self.app.cleanup(&mut self.ctx);
        self.ctx.release();

        idle.map_err(Into::into)
    }
}

impl<A, D> Drop for Harness<A, D>
where
    A: FrameApp<D>,
    D: Driver,
{
    fn drop(&mut self) {
        if self.state != LifecycleState::Terminated {
            tracing::warn!("Harness dropped without terminate; tearing down");
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameContext;
    use vkframe_gpu::ResourceKind;
    use vkframe_test::{Call, MockConfig, Recorder, RecordingDriver};

    /// Records the image index of every draw.
    #[derive(Default)]
    struct CountingApp {
        draws: Vec<u32>,
    }

    impl FrameApp<RecordingDriver> for CountingApp {
        fn init(_ctx: &mut AppContext<RecordingDriver>) -> anyhow::Result<Self> {
            Ok(Self::default())
        }

        fn draw(
            &mut self,
            _ctx: &AppContext<RecordingDriver>,
            frame: &FrameContext,
        ) -> anyhow::Result<()> {
            self.draws.push(frame.image_index);
            Ok(())
        }

        fn cleanup(&mut self, ctx: &mut AppContext<RecordingDriver>) {
            // Frame objects are still alive while the hook runs
            assert!(ctx.live_objects() > 0);
        }
    }

    struct FailingApp;

    impl FrameApp<RecordingDriver> for FailingApp {
        fn init(_ctx: &mut AppContext<RecordingDriver>) -> anyhow::Result<Self> {
            anyhow::bail!("setup failed")
        }

        fn draw(
            &mut self,
            _ctx: &AppContext<RecordingDriver>,
            _frame: &FrameContext,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn window_640x480() -> vk::Extent2D {
        vk::Extent2D {
            width: 640,
            height: 480,
        }
    }

    fn initialize(config: MockConfig) -> (Harness<CountingApp, RecordingDriver>, Recorder) {
        let driver = RecordingDriver::new(config);
        let recorder = driver.recorder();
        let harness = Harness::initialize(driver, &RenderConfig::default(), window_640x480)
            .unwrap_or_else(|e| panic!("initialize failed: {e}"));
        (harness, recorder)
    }

    fn assert_idle_before_every_destroy(recorder: &Recorder) {
        let idle = recorder
            .position(|c| matches!(c, Call::DeviceWaitIdle))
            .expect("no idle wait");
        let first_destroy = recorder
            .position(|c| matches!(c, Call::Destroy(..)))
            .expect("nothing destroyed");
        assert!(idle < first_destroy);
    }

    #[test]
    fn end_to_end_single_frame() {
        let (mut harness, recorder) = initialize(MockConfig::default());
        assert_eq!(harness.state(), LifecycleState::Initialized);
        assert!(harness.context().image_count() >= 2);
        assert_eq!(harness.context().extent(), window_640x480());

        harness.render().unwrap();
        assert_eq!(harness.state(), LifecycleState::Rendering);
        assert_eq!(harness.app().draws, vec![0]);

        let acquire = recorder
            .position(|c| matches!(c, Call::AcquireNextImage { .. }))
            .unwrap();
        let wait = recorder
            .position(|c| matches!(c, Call::WaitForFence { .. }))
            .unwrap();
        let submit = recorder
            .position(|c| matches!(c, Call::Submit { .. }))
            .unwrap();
        let present = recorder
            .position(|c| matches!(c, Call::Present { .. }))
            .unwrap();
        assert!(acquire < wait && wait < submit && submit < present);
        assert_eq!(recorder.blocked_waits(), 0);

        harness.terminate().unwrap();
        assert_idle_before_every_destroy(&recorder);
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.invalid_destroys(), 0);
    }

    #[test]
    fn terminate_without_rendering_releases_everything() {
        let (harness, recorder) = initialize(MockConfig::default());
        assert!(recorder.outstanding() > 0);

        harness.terminate().unwrap();
        assert_idle_before_every_destroy(&recorder);
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.calls().last(), Some(&Call::Shutdown));
    }

    #[test]
    fn terminate_after_many_frames_releases_everything() {
        let (mut harness, recorder) =
            initialize(MockConfig::default().with_swapchain_image_count(3));
        for _ in 0..10 {
            harness.render().unwrap();
        }
        assert_eq!(harness.frame_count(), 10);
        assert_eq!(harness.app().draws, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);

        harness.terminate().unwrap();
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.blocked_waits(), 0);
    }

    #[test]
    fn teardown_destroys_in_reverse_creation_order() {
        let (harness, recorder) = initialize(MockConfig::default());
        harness.terminate().unwrap();

        let calls = recorder.calls();
        let created: Vec<ResourceKind> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Create(kind, _) => Some(*kind),
                Call::AllocateCommandBuffers { .. } => Some(ResourceKind::CommandBuffers),
                _ => None,
            })
            .collect();
        let mut destroyed: Vec<ResourceKind> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Destroy(kind, _) => Some(*kind),
                _ => None,
            })
            .collect();
        destroyed.reverse();

        assert_eq!(created, destroyed);
        assert_eq!(destroyed.first(), Some(&ResourceKind::CommandPool));
    }

    #[test]
    fn cleanup_hook_runs_after_idle_wait() {
        struct Probe {
            recorder: Recorder,
        }

        impl FrameApp<RecordingDriver> for Probe {
            fn init(ctx: &mut AppContext<RecordingDriver>) -> anyhow::Result<Self> {
                Ok(Self {
                    recorder: ctx.driver().recorder(),
                })
            }

            fn draw(
                &mut self,
                _ctx: &AppContext<RecordingDriver>,
                _frame: &FrameContext,
            ) -> anyhow::Result<()> {
                Ok(())
            }

            fn cleanup(&mut self, _ctx: &mut AppContext<RecordingDriver>) {
                assert_eq!(self.recorder.calls().last(), Some(&Call::DeviceWaitIdle));
            }
        }

        let harness: Harness<Probe, RecordingDriver> =
            Harness::initialize(RecordingDriver::default(), &RenderConfig::default(), window_640x480)
                .unwrap_or_else(|e| panic!("initialize failed: {e}"));
        harness.terminate().unwrap();
    }

    #[test]
    fn dropping_without_terminate_tears_down() {
        let (mut harness, recorder) = initialize(MockConfig::default());
        harness.render().unwrap();
        drop(harness);

        assert_idle_before_every_destroy(&recorder);
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.calls().last(), Some(&Call::Shutdown));
    }

    #[test]
    fn failed_frame_stops_rendering_but_still_tears_down() {
        /// Fails its first draw.
        struct FailsFirstDraw {
            draws: u32,
        }

        impl FrameApp<RecordingDriver> for FailsFirstDraw {
            fn init(_ctx: &mut AppContext<RecordingDriver>) -> anyhow::Result<Self> {
                Ok(Self { draws: 0 })
            }

            fn draw(
                &mut self,
                _ctx: &AppContext<RecordingDriver>,
                _frame: &FrameContext,
            ) -> anyhow::Result<()> {
                self.draws += 1;
                if self.draws == 1 {
                    anyhow::bail!("draw failed");
                }
                Ok(())
            }
        }

        let driver = RecordingDriver::default();
        let recorder = driver.recorder();
        let mut harness: Harness<FailsFirstDraw, RecordingDriver> =
            Harness::initialize(driver, &RenderConfig::default(), window_640x480)
                .unwrap_or_else(|e| panic!("initialize failed: {e}"));

        assert!(harness.render().is_err());
        assert_eq!(harness.state(), LifecycleState::Failed);
        let calls_after_failure = recorder.calls().len();

        assert!(harness.render().is_err());
        assert_eq!(harness.state(), LifecycleState::Failed);
        assert_eq!(harness.app().draws, 1);
        assert_eq!(recorder.calls().len(), calls_after_failure);
        assert_eq!(
            recorder.count(|c| matches!(c, Call::AcquireNextImage { .. })),
            1
        );
        assert_eq!(recorder.count(|c| matches!(c, Call::Submit { .. })), 0);

        harness.terminate().unwrap();
        assert_idle_before_every_destroy(&recorder);
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.invalid_destroys(), 0);
    }

    #[test]
    fn failing_setup_hook_unwinds_resources() {
        let driver = RecordingDriver::default();
        let recorder = driver.recorder();
        let result: anyhow::Result<Harness<FailingApp, RecordingDriver>> =
            Harness::initialize(driver, &RenderConfig::default(), window_640x480);

        assert!(result.is_err());
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.calls().last(), Some(&Call::Shutdown));
    }

    #[test]
    fn failing_resource_creation_unwinds_and_drops_driver() {
        let driver =
            RecordingDriver::new(MockConfig::default().failing_on(ResourceKind::Fence, 1));
        let recorder = driver.recorder();
        let result: anyhow::Result<Harness<CountingApp, RecordingDriver>> =
            Harness::initialize(driver, &RenderConfig::default(), window_640x480);

        assert!(result.is_err());
        assert_eq!(recorder.outstanding(), 0);
        assert_eq!(recorder.invalid_destroys(), 0);
        assert_eq!(recorder.calls().last(), Some(&Call::Shutdown));
    }
}
