//! # Vireo Graphics
//!
//! Vulkan resources and multi-buffered stereo frame submission.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - a Vulkan device bootstrapped by the XR runtime, or
//!   a Dummy device for running without a GPU
//! - [`GpuBuffer`], [`GpuImage`], [`RenderPass`], [`RenderTarget`] - owned
//!   resources with deterministic teardown
//! - [`Pipeline`] and [`Material`] - immutable pipelines shared by
//!   structurally equal materials
//! - [`Renderer`] - the ring of [`FrameRenderProcess`]es drawing into a
//!   [`StereoTarget`]
//!
//! ## Example
//!
//! ```ignore
//! let mut renderer = Renderer::new(&device, render_pass, config, materials, &mesh, objects.len())?;
//! renderer.render(&headset, &objects, camera, image_index, time, light);
//! renderer.submit(false);
//! ```

pub mod backend;
pub mod device;
pub mod error;
pub mod materials;
pub mod pipeline;
pub mod renderer;
pub mod resources;

// Re-export main types for convenience
pub use backend::{DummyCommand, DummyDevice, DummySubmission, GpuFence, GpuSemaphore};
pub use device::{DeviceBackend, DeviceLimits, GraphicsDevice};
pub use error::GraphicsError;
pub use materials::{BlendComponent, Material, PipelineState};
pub use pipeline::{Pipeline, PipelineDescriptor};
pub use renderer::{
    DynamicUniformData, FrameRenderProcess, FrameRing, Renderer, RendererConfig,
    StaticFragmentUniformData, StaticVertexUniformData, StereoTarget, UniformLayout,
};
pub use resources::{
    align_up, find_memory_type, GpuBuffer, GpuImage, ImageDescriptor, RenderPass, RenderTarget,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
pub fn init() {
    log::info!("Vireo Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_device() {
        let device = GraphicsDevice::dummy();
        assert_eq!(device.backend_name(), "Dummy");
    }
}
