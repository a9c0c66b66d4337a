//! GPU resources.
//!
//! - [`GpuBuffer`] - device memory bound to a linear buffer
//! - [`GpuImage`] - device memory bound to a 2-D image, with its view
//! - [`RenderPass`] - the stereo multiview render pass
//! - [`RenderTarget`] - framebuffer over one swapchain image
//!
//! Every owner holds an `Arc` of the [`GraphicsDevice`] so the device
//! outlives it. Handles are created in order and released in reverse, each
//! release skipped when its handle is null, so a partially constructed
//! resource tears down cleanly.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice

mod buffer;
mod image;
mod memory;
mod render_pass;
mod render_target;

pub use buffer::GpuBuffer;
pub use image::{GpuImage, ImageDescriptor};
pub use memory::{align_up, find_memory_type};
pub use render_pass::RenderPass;
pub use render_target::RenderTarget;
