//! Main application struct and frame loop.

use std::sync::Arc;
use std::time::Duration;

use vireo_core::GameObject;
use vireo_graphics::{GraphicsDevice, GraphicsError, Renderer, RendererConfig};
use vireo_xr::{
    BeginFrameResult, DummyRuntime, Headset, HeadsetConfig, XrDevice, XrDeviceConfig, XrRuntime,
};

use crate::args::AppArgs;
use crate::context::{AppContext, UpdateContext};
use crate::error::AppError;
use crate::handler::AppHandler;

/// How long to back off while the session is not running.
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Counters reported when the frame loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Frame loop iterations.
    pub frames: u64,
    /// Frames drawn and submitted to the compositor.
    pub rendered_frames: u64,
    pub renderer_dropped_frames: u64,
    pub headset_dropped_frames: u64,
    pub exit_requested: bool,
}

/// Drives a headset and a renderer for an [`AppHandler`].
///
/// # Example
///
/// ```ignore
/// use vireo_app::{App, AppArgs, DemoScene};
///
/// fn main() {
///     let args = AppArgs::parse();
///     if let Err(e) = App::run(DemoScene::new(), args) {
///         std::process::exit(e.exit_code());
///     }
/// }
/// ```
pub struct App<H: AppHandler> {
    handler: H,
    args: AppArgs,
    context: AppContext,
}

impl<H: AppHandler> App<H> {
    pub fn new(handler: H, args: AppArgs) -> Self {
        Self {
            handler,
            args,
            context: AppContext::default(),
        }
    }

    /// Initialize logging, create the device and runtime, and run the frame
    /// loop until the runtime asks to exit.
    pub fn run(handler: H, args: AppArgs) -> Result<RunSummary, AppError> {
        env_logger::Builder::new()
            .parse_filters(&args.log_filter())
            .try_init()?;

        vireo_core::init();
        vireo_graphics::init();
        vireo_xr::init();
        crate::init();

        let (device, runtime) = if args.dummy {
            log::info!("Running headless on the Dummy device and a scripted runtime");
            (
                Arc::new(GraphicsDevice::dummy()),
                XrRuntime::Dummy(DummyRuntime::started()),
            )
        } else {
            let xr = XrDevice::new(&XrDeviceConfig {
                validation: args.validation,
                ..Default::default()
            })?;
            (xr.graphics, xr.runtime)
        };

        Self::new(handler, args).run_on(&device, runtime)
    }

    /// Run the frame loop on an existing device and runtime.
    pub fn run_on(
        mut self,
        device: &Arc<GraphicsDevice>,
        runtime: XrRuntime,
    ) -> Result<RunSummary, AppError> {
        std::fs::read_dir(&self.args.shader_dir).map_err(|source| AppError::ShaderDir {
            path: self.args.shader_dir.clone(),
            source,
        })?;

        let mut headset = Headset::new(device, runtime, HeadsetConfig::default())?;
        let scene = self.handler.on_init(&mut self.context)?;

        let config = RendererConfig {
            frames_in_flight: self.args.frames_in_flight,
            shader_dir: self.args.shader_dir.clone(),
            ..Default::default()
        };
        let mut renderer = Renderer::new(
            device,
            headset.render_pass().handle(),
            config,
            scene.materials,
            &scene.mesh,
            scene.objects.len(),
        )?;
        let mut objects = scene.objects;

        let result = self.frame_loop(&mut headset, &mut renderer, &mut objects);

        // Sync before teardown so no resource is destroyed while in use
        if let Err(e) = device.wait_idle() {
            log::error!("Failed to wait for device idle: {}", e);
        }
        self.handler.on_shutdown(&self.context);

        let summary = RunSummary {
            frames: self.context.frame_number,
            rendered_frames: self.context.rendered_frames,
            renderer_dropped_frames: renderer.dropped_frames(),
            headset_dropped_frames: headset.dropped_frames(),
            exit_requested: headset.is_exit_requested(),
        };
        log::info!("Frame loop finished: {:?}", summary);

        drop(renderer);
        drop(headset);
        result.map(|()| summary).map_err(AppError::from)
    }

    fn frame_loop(
        &mut self,
        headset: &mut Headset,
        renderer: &mut Renderer,
        objects: &mut [GameObject],
    ) -> Result<(), GraphicsError> {
        while !headset.is_exit_requested() {
            if let Some(max_frames) = self.args.max_frames {
                if self.context.frame_number >= max_frames {
                    log::info!("Reached max frames limit ({}), exiting", max_frames);
                    break;
                }
            }

            self.context.timer.tick();
            self.context.frame_number += 1;

            match headset.begin_frame() {
                BeginFrameResult::Error(e) => {
                    log::error!("Headset frame failed: {}", e);
                    return Err(e);
                }
                BeginFrameResult::RenderFully {
                    swapchain_image_index,
                } => {
                    self.context.light.update(self.context.timer.delta_seconds());

                    let keep_running = self.handler.on_update(&mut UpdateContext {
                        app: &self.context,
                        headset: &mut *headset,
                        objects: &mut *objects,
                    });
                    for object in objects.iter_mut() {
                        object.update(headset.world_matrix);
                    }

                    renderer.render(
                        &*headset,
                        objects,
                        headset.camera_matrix,
                        swapchain_image_index,
                        self.context.timer.elapsed_seconds(),
                        self.context.light.direction(),
                    );
                    renderer.submit(false);
                    headset.end_frame();
                    self.context.rendered_frames += 1;

                    if !keep_running {
                        log::info!("Handler requested exit");
                        break;
                    }
                }
                BeginFrameResult::SkipRender => headset.end_frame(),
                BeginFrameResult::SkipFully => std::thread::sleep(IDLE_BACKOFF),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    struct EmptyScene;

    impl AppHandler for EmptyScene {
        fn on_init(&mut self, _ctx: &mut AppContext) -> Result<Scene, AppError> {
            Ok(Scene::default())
        }
    }

    #[test]
    fn missing_shader_dir_fails_before_headset() {
        let device = Arc::new(GraphicsDevice::dummy());
        let runtime = DummyRuntime::started();
        let handle = runtime.handle();
        let args = AppArgs::default().with_shader_dir("/nonexistent/vireo/shaders");

        let result = App::new(EmptyScene, args).run_on(&device, XrRuntime::Dummy(runtime));
        assert!(matches!(result, Err(AppError::ShaderDir { .. })));
        assert!(handle.calls().is_empty());
    }
}
