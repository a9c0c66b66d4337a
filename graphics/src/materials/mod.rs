//! Materials: a shader pair, a color multiplier and fixed-function state.
//!
//! Materials are plain values. The renderer compiles one
//! [`Pipeline`](crate::Pipeline) per distinct shader pair and state and
//! shares it between materials that only differ in color.

mod material;

pub use material::{BlendComponent, Material, PipelineState};
