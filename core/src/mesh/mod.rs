//! CPU-side mesh data for the merged vertex/index buffer.
//!
//! All models of a scene share one vertex block followed by one `u32`
//! index block. [`MeshData`] builds that layout and hands every model a
//! [`Model`] range into the shared index block.

mod data;
pub mod generators;

pub use data::{MeshData, Model, Vertex};
