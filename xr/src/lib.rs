//! # Vireo XR
//!
//! The headset side of Vireo:
//!
//! - [`XrDevice`] - OpenXR instance, system and the Vulkan device the
//!   runtime asks for
//! - [`Headset`] - session state machine, swapchain render targets and
//!   per-eye matrices, usable as a [`StereoTarget`](vireo_graphics::StereoTarget)
//! - [`runtime`] - the OpenXR runtime and a scripted dummy runtime

pub mod device;
pub mod headset;
pub mod runtime;

pub use device::{ReferenceSpace, XrDevice, XrDeviceConfig};
pub use headset::{BeginFrameResult, Headset, HeadsetConfig, EYE_COUNT};
pub use runtime::{
    DummyRuntime, DummyRuntimeHandle, RuntimeCall, SessionEvent, SessionState, XrRuntime,
};

/// XR library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the XR subsystem.
pub fn init() {
    log::info!("Vireo XR v{} initialized", VERSION);
}
