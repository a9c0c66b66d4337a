//! The frame loop on the Dummy device and the scripted runtime.

mod common;

use common::{dummy_device, ShaderDir};
use rstest::rstest;
use vireo_app::{App, AppArgs, AppContext, AppError, AppHandler, DemoScene, Scene, UpdateContext};
use vireo_xr::{DummyRuntime, RuntimeCall, SessionState, XrRuntime};

fn args(shaders: &ShaderDir) -> AppArgs {
    AppArgs::default().with_shader_dir(shaders.path())
}

#[rstest]
#[case::single_buffered(1)]
#[case::double_buffered(2)]
#[case::triple_buffered(3)]
fn demo_scene_runs_for_max_frames(#[case] frames_in_flight: usize) {
    let device = dummy_device();
    let shaders = ShaderDir::diffuse();
    let runtime = DummyRuntime::started();
    let handle = runtime.handle();

    let mut args = args(&shaders).with_max_frames(6);
    args.frames_in_flight = frames_in_flight;
    let summary = App::new(DemoScene::new(), args)
        .run_on(&device, XrRuntime::Dummy(runtime))
        .unwrap();

    assert_eq!(summary.frames, 6);
    assert_eq!(summary.rendered_frames, 6);
    assert_eq!(summary.renderer_dropped_frames, 0);
    assert_eq!(summary.headset_dropped_frames, 0);
    assert!(!summary.exit_requested);

    assert_eq!(device.as_dummy().unwrap().submission_count(), 6);
    assert_eq!(handle.count(&RuntimeCall::EndFrame { layer_count: 1 }), 6);
    // The headset ends the running session when it is dropped.
    assert!(!handle.session_running());
}

#[test]
fn runtime_exit_stops_the_loop() {
    let device = dummy_device();
    let shaders = ShaderDir::diffuse();
    let runtime = DummyRuntime::started();
    runtime
        .handle()
        .push_states(&[SessionState::Stopping, SessionState::Exiting]);

    let summary = App::new(DemoScene::new(), args(&shaders))
        .run_on(&device, XrRuntime::Dummy(runtime))
        .unwrap();

    assert!(summary.exit_requested);
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.rendered_frames, 0);
    assert_eq!(device.as_dummy().unwrap().submission_count(), 0);
}

#[test]
fn skipped_frames_are_not_rendered() {
    let device = dummy_device();
    let shaders = ShaderDir::diffuse();
    let runtime = DummyRuntime::started();
    let handle = runtime.handle();
    handle.set_should_render(false);

    let summary = App::new(DemoScene::new(), args(&shaders).with_max_frames(3))
        .run_on(&device, XrRuntime::Dummy(runtime))
        .unwrap();

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.rendered_frames, 0);
    assert_eq!(handle.count(&RuntimeCall::EndFrame { layer_count: 0 }), 3);
}

/// Stops after a fixed number of updates.
struct Countdown {
    remaining: u32,
}

impl AppHandler for Countdown {
    fn on_init(&mut self, _ctx: &mut AppContext) -> Result<Scene, AppError> {
        Ok(DemoScene::build())
    }

    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> bool {
        assert!(ctx.app.frame_number() > 0);
        self.remaining -= 1;
        self.remaining > 0
    }

    fn on_shutdown(&mut self, ctx: &AppContext) {
        assert_eq!(ctx.rendered_frames(), 2);
    }
}

#[test]
fn handler_can_stop_the_loop() {
    let device = dummy_device();
    let shaders = ShaderDir::diffuse();

    let summary = App::new(
        Countdown { remaining: 2 },
        args(&shaders),
    )
    .run_on(&device, XrRuntime::Dummy(DummyRuntime::started()))
    .unwrap();

    assert_eq!(summary.rendered_frames, 2);
    assert_eq!(device.as_dummy().unwrap().submission_count(), 2);
}

#[test]
fn eye_mismatch_is_fatal() {
    let device = dummy_device();
    let shaders = ShaderDir::diffuse();
    let runtime = DummyRuntime::started();
    runtime.handle().set_views(Vec::new());

    let result = App::new(DemoScene::new(), args(&shaders).with_max_frames(5))
        .run_on(&device, XrRuntime::Dummy(runtime));

    assert!(matches!(result, Err(AppError::Graphics(_))));
}
