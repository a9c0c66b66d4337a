//! XR runtime layer.
//!
//! The [`Headset`](crate::Headset) talks to the runtime through
//! [`XrRuntime`], which dispatches to one of two implementations:
//!
//! - `openxr`: a real OpenXR session bound to the Vulkan device
//! - `dummy`: a scripted runtime with an event queue, configurable frame
//!   state and a call log, for running without a headset

pub mod dummy;
pub mod openxr;

use ash::vk;
use vireo_core::{Fov, Pose};
use vireo_graphics::GraphicsError;

pub use self::dummy::{DummyRuntime, DummyRuntimeHandle, RuntimeCall};
pub use self::openxr::OpenXrRuntime;

/// Lifecycle state of an XR session, as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    /// States in which frames are waited on and submitted.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::Synchronized | Self::Visible | Self::Focused
        )
    }
}

/// An event read from the runtime's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    InstanceLossPending,
    EventsLost(u32),
}

/// Result of waiting for the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    /// Predicted display time in nanoseconds of runtime time.
    pub predicted_display_time: i64,
    /// `false` when the runtime does not need this frame's image.
    pub should_render: bool,
}

/// Pose and field of view of one eye.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewLocation {
    pub pose: Pose,
    pub fov: Fov,
}

/// Eye locations for one display time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocatedViews {
    pub position_valid: bool,
    pub orientation_valid: bool,
    pub views: Vec<ViewLocation>,
}

impl LocatedViews {
    /// Whether the views can be composited.
    pub fn is_tracked(&self) -> bool {
        self.position_valid && self.orientation_valid
    }
}

/// The projection layer handed to the compositor at the end of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionLayer<'a> {
    pub views: &'a [ViewLocation],
    /// Size of each eye's sub-image; eye `i` uses swapchain array layer `i`.
    pub eye_extent: vk::Extent2D,
}

/// The XR runtime behind a [`Headset`](crate::Headset).
#[allow(clippy::large_enum_variant)]
pub enum XrRuntime {
    Dummy(DummyRuntime),
    OpenXr(OpenXrRuntime),
}

impl std::fmt::Debug for XrRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "XrRuntime::{}", self.name())
    }
}

impl XrRuntime {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dummy(_) => "Dummy",
            Self::OpenXr(_) => "OpenXR",
        }
    }

    /// Recommended image size of each eye.
    pub fn eye_resolutions(&self) -> Result<Vec<vk::Extent2D>, GraphicsError> {
        match self {
            Self::Dummy(runtime) => Ok(runtime.eye_resolutions()),
            Self::OpenXr(runtime) => runtime.eye_resolutions(),
        }
    }

    pub fn swapchain_formats(&self) -> Result<Vec<vk::Format>, GraphicsError> {
        match self {
            Self::Dummy(runtime) => Ok(runtime.swapchain_formats()),
            Self::OpenXr(runtime) => runtime.swapchain_formats(),
        }
    }

    /// Create the swapchain with one array layer per eye and return its
    /// images.
    pub fn create_swapchain(
        &mut self,
        extent: vk::Extent2D,
        format: vk::Format,
        layer_count: u32,
    ) -> Result<Vec<vk::Image>, GraphicsError> {
        match self {
            Self::Dummy(runtime) => Ok(runtime.create_swapchain(extent, format, layer_count)),
            Self::OpenXr(runtime) => runtime.create_swapchain(extent, format, layer_count),
        }
    }

    /// Next pending event, if any.
    pub fn poll_event(&mut self) -> Result<Option<SessionEvent>, GraphicsError> {
        match self {
            Self::Dummy(runtime) => Ok(runtime.poll_event()),
            Self::OpenXr(runtime) => runtime.poll_event(),
        }
    }

    pub fn begin_session(&mut self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.begin_session(),
            Self::OpenXr(runtime) => runtime.begin_session(),
        }
    }

    pub fn end_session(&mut self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.end_session(),
            Self::OpenXr(runtime) => runtime.end_session(),
        }
    }

    /// Block until the runtime is ready for the next frame.
    pub fn wait_frame(&mut self) -> Result<FrameTiming, GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.wait_frame(),
            Self::OpenXr(runtime) => runtime.wait_frame(),
        }
    }

    pub fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.begin_frame(),
            Self::OpenXr(runtime) => runtime.begin_frame(),
        }
    }

    /// Locate the eyes against the reference space at `display_time`.
    pub fn locate_views(&mut self, display_time: i64) -> Result<LocatedViews, GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.locate_views(display_time),
            Self::OpenXr(runtime) => runtime.locate_views(display_time),
        }
    }

    /// Acquire the next swapchain image and wait until it can be written.
    pub fn acquire_swapchain_image(&mut self) -> Result<usize, GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.acquire_swapchain_image(),
            Self::OpenXr(runtime) => runtime.acquire_swapchain_image(),
        }
    }

    pub fn release_swapchain_image(&mut self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.release_swapchain_image(),
            Self::OpenXr(runtime) => runtime.release_swapchain_image(),
        }
    }

    /// End the frame with the given projection layer, or with no layers.
    pub fn end_frame(
        &mut self,
        display_time: i64,
        layer: Option<ProjectionLayer<'_>>,
    ) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(runtime) => runtime.end_frame(display_time, layer),
            Self::OpenXr(runtime) => runtime.end_frame(display_time, layer),
        }
    }

    pub fn as_dummy(&self) -> Option<&DummyRuntime> {
        match self {
            Self::Dummy(runtime) => Some(runtime),
            Self::OpenXr(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_states() {
        assert!(!SessionState::Idle.is_running());
        assert!(SessionState::Ready.is_running());
        assert!(SessionState::Focused.is_running());
        assert!(!SessionState::Stopping.is_running());
        assert!(!SessionState::Exiting.is_running());
    }

    #[test]
    fn tracking_needs_position_and_orientation() {
        let views = LocatedViews {
            position_valid: true,
            orientation_valid: false,
            views: Vec::new(),
        };
        assert!(!views.is_tracked());
    }
}
