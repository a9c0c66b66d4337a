//! Scripted XR runtime for testing and development.
//!
//! The runtime keeps its state behind a shared lock. A
//! [`DummyRuntimeHandle`] obtained before the runtime is handed to the
//! headset can queue events, change what the next frames report and read
//! back the calls the headset made.

use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::Mutex;
use vireo_core::math::{Quat, Vec3};
use vireo_core::{Fov, Pose};
use vireo_graphics::GraphicsError;

use super::{
    FrameTiming, LocatedViews, ProjectionLayer, SessionEvent, SessionState, ViewLocation,
};

/// Half the distance between the eyes of the default views.
const HALF_IPD: f32 = 0.032;

/// Display period of the scripted display, 90 Hz.
const FRAME_PERIOD_NS: i64 = 11_111_111;

/// First raw value of the fake swapchain images.
const IMAGE_HANDLE_BASE: u64 = 1 << 40;

/// A runtime call made by the headset, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    CreateSwapchain {
        extent: vk::Extent2D,
        format: vk::Format,
        layer_count: u32,
    },
    BeginSession,
    EndSession,
    WaitFrame,
    BeginFrame,
    LocateViews,
    AcquireImage(usize),
    ReleaseImage,
    EndFrame { layer_count: usize },
}

#[derive(Debug)]
struct DummyRuntimeState {
    events: VecDeque<SessionEvent>,
    calls: Vec<RuntimeCall>,
    eye_resolutions: Vec<vk::Extent2D>,
    swapchain_formats: Vec<vk::Format>,
    swapchain_image_count: usize,
    swapchain_images: Vec<vk::Image>,
    next_image: usize,
    acquired: bool,
    session_running: bool,
    should_render: bool,
    located: LocatedViews,
    display_time: i64,
}

/// Default eye layout: two eyes at standing height, 64 mm apart.
fn default_views() -> Vec<ViewLocation> {
    [-HALF_IPD, HALF_IPD]
        .into_iter()
        .map(|x| ViewLocation {
            pose: Pose::new(Vec3::new(x, 1.6, 0.0), Quat::IDENTITY),
            fov: Fov {
                angle_left: -0.8,
                angle_right: 0.75,
                angle_up: 0.8,
                angle_down: -0.85,
            },
        })
        .collect()
}

/// Scripted runtime with two eyes and a three-image swapchain.
#[derive(Debug, Clone)]
pub struct DummyRuntime {
    state: Arc<Mutex<DummyRuntimeState>>,
}

/// Script and inspection handle for a [`DummyRuntime`].
#[derive(Debug, Clone)]
pub struct DummyRuntimeHandle {
    state: Arc<Mutex<DummyRuntimeState>>,
}

impl DummyRuntime {
    pub fn new() -> Self {
        let resolution = vk::Extent2D {
            width: 1440,
            height: 1600,
        };
        Self {
            state: Arc::new(Mutex::new(DummyRuntimeState {
                events: VecDeque::new(),
                calls: Vec::new(),
                eye_resolutions: vec![resolution; 2],
                swapchain_formats: vec![vk::Format::R8G8B8A8_SRGB, vk::Format::B8G8R8A8_SRGB],
                swapchain_image_count: 3,
                swapchain_images: Vec::new(),
                next_image: 0,
                acquired: false,
                session_running: false,
                should_render: true,
                located: LocatedViews {
                    position_valid: true,
                    orientation_valid: true,
                    views: default_views(),
                },
                display_time: 0,
            })),
        }
    }

    /// A runtime that starts the session the way a runtime does after
    /// creation: `Idle`, then `Ready`, then `Synchronized`, `Visible`
    /// and `Focused`.
    pub fn started() -> Self {
        let runtime = Self::new();
        runtime.handle().push_states(&[
            SessionState::Idle,
            SessionState::Ready,
            SessionState::Synchronized,
            SessionState::Visible,
            SessionState::Focused,
        ]);
        runtime
    }

    pub fn with_eye_resolutions(self, resolutions: Vec<vk::Extent2D>) -> Self {
        self.state.lock().eye_resolutions = resolutions;
        self
    }

    pub fn with_swapchain_formats(self, formats: Vec<vk::Format>) -> Self {
        self.state.lock().swapchain_formats = formats;
        self
    }

    pub fn with_swapchain_image_count(self, count: usize) -> Self {
        self.state.lock().swapchain_image_count = count;
        self
    }

    pub fn handle(&self) -> DummyRuntimeHandle {
        DummyRuntimeHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub(crate) fn eye_resolutions(&self) -> Vec<vk::Extent2D> {
        self.state.lock().eye_resolutions.clone()
    }

    pub(crate) fn swapchain_formats(&self) -> Vec<vk::Format> {
        self.state.lock().swapchain_formats.clone()
    }

    pub(crate) fn create_swapchain(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        layer_count: u32,
    ) -> Vec<vk::Image> {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::CreateSwapchain {
            extent,
            format,
            layer_count,
        });
        state.swapchain_images = (0..state.swapchain_image_count as u64)
            .map(|i| vk::Image::from_raw(IMAGE_HANDLE_BASE + i))
            .collect();
        state.swapchain_images.clone()
    }

    pub(crate) fn poll_event(&self) -> Option<SessionEvent> {
        self.state.lock().events.pop_front()
    }

    pub(crate) fn begin_session(&self) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::BeginSession);
        if state.session_running {
            return Err(GraphicsError::GenericOpenXr(
                "session is already running".to_string(),
            ));
        }
        state.session_running = true;
        Ok(())
    }

    pub(crate) fn end_session(&self) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::EndSession);
        if !state.session_running {
            return Err(GraphicsError::GenericOpenXr(
                "session is not running".to_string(),
            ));
        }
        state.session_running = false;
        Ok(())
    }

    pub(crate) fn wait_frame(&self) -> Result<FrameTiming, GraphicsError> {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::WaitFrame);
        if !state.session_running {
            return Err(GraphicsError::GenericOpenXr(
                "frame wait without a running session".to_string(),
            ));
        }
        state.display_time += FRAME_PERIOD_NS;
        Ok(FrameTiming {
            predicted_display_time: state.display_time,
            should_render: state.should_render,
        })
    }

    pub(crate) fn begin_frame(&self) -> Result<(), GraphicsError> {
        self.state.lock().calls.push(RuntimeCall::BeginFrame);
        Ok(())
    }

    pub(crate) fn locate_views(&self, _display_time: i64) -> Result<LocatedViews, GraphicsError> {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::LocateViews);
        Ok(state.located.clone())
    }

    pub(crate) fn acquire_swapchain_image(&self) -> Result<usize, GraphicsError> {
        let mut state = self.state.lock();
        if state.swapchain_images.is_empty() {
            return Err(GraphicsError::GenericOpenXr("no swapchain".to_string()));
        }
        if state.acquired {
            return Err(GraphicsError::GenericOpenXr(
                "swapchain image acquired twice".to_string(),
            ));
        }
        let index = state.next_image;
        state.next_image = (index + 1) % state.swapchain_images.len();
        state.acquired = true;
        state.calls.push(RuntimeCall::AcquireImage(index));
        Ok(index)
    }

    pub(crate) fn release_swapchain_image(&self) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::ReleaseImage);
        if !std::mem::take(&mut state.acquired) {
            return Err(GraphicsError::GenericOpenXr(
                "no swapchain image acquired".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn end_frame(
        &self,
        _display_time: i64,
        layer: Option<ProjectionLayer<'_>>,
    ) -> Result<(), GraphicsError> {
        self.state.lock().calls.push(RuntimeCall::EndFrame {
            layer_count: usize::from(layer.is_some()),
        });
        Ok(())
    }
}

impl Default for DummyRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyRuntimeHandle {
    pub fn push_event(&self, event: SessionEvent) {
        self.state.lock().events.push_back(event);
    }

    /// Queue one state change event per state.
    pub fn push_states(&self, states: &[SessionState]) {
        let mut state = self.state.lock();
        state
            .events
            .extend(states.iter().map(|s| SessionEvent::StateChanged(*s)));
    }

    pub fn set_should_render(&self, should_render: bool) {
        self.state.lock().should_render = should_render;
    }

    /// Replace the eye locations reported from now on.
    pub fn set_views(&self, views: Vec<ViewLocation>) {
        self.state.lock().located.views = views;
    }

    pub fn set_tracking(&self, position_valid: bool, orientation_valid: bool) {
        let mut state = self.state.lock();
        state.located.position_valid = position_valid;
        state.located.orientation_valid = orientation_valid;
    }

    pub fn pending_events(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn session_running(&self) -> bool {
        self.state.lock().session_running
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of calls equal to `call`.
    pub fn count(&self, call: &RuntimeCall) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_come_out_in_order() {
        let runtime = DummyRuntime::new();
        let handle = runtime.handle();
        handle.push_states(&[SessionState::Idle, SessionState::Ready]);

        assert_eq!(
            runtime.poll_event(),
            Some(SessionEvent::StateChanged(SessionState::Idle))
        );
        assert_eq!(
            runtime.poll_event(),
            Some(SessionEvent::StateChanged(SessionState::Ready))
        );
        assert_eq!(runtime.poll_event(), None);
    }

    #[test]
    fn swapchain_images_cycle() {
        let runtime = DummyRuntime::new().with_swapchain_image_count(2);
        let extent = vk::Extent2D {
            width: 8,
            height: 8,
        };
        let images = runtime.create_swapchain(extent, vk::Format::R8G8B8A8_SRGB, 2);
        assert_eq!(images.len(), 2);

        let mut acquired = Vec::new();
        for _ in 0..3 {
            acquired.push(runtime.acquire_swapchain_image().unwrap());
            runtime.release_swapchain_image().unwrap();
        }
        assert_eq!(acquired, vec![0, 1, 0]);
    }

    #[test]
    fn double_acquire_is_an_error() {
        let runtime = DummyRuntime::new();
        runtime.create_swapchain(
            vk::Extent2D {
                width: 8,
                height: 8,
            },
            vk::Format::R8G8B8A8_SRGB,
            2,
        );
        runtime.acquire_swapchain_image().unwrap();
        assert!(runtime.acquire_swapchain_image().is_err());
    }

    #[test]
    fn frame_wait_requires_running_session() {
        let runtime = DummyRuntime::new();
        assert!(runtime.wait_frame().is_err());

        runtime.begin_session().unwrap();
        let first = runtime.wait_frame().unwrap();
        let second = runtime.wait_frame().unwrap();
        assert!(second.predicted_display_time > first.predicted_display_time);
    }
}
