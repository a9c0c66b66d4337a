//! # Vireo Core
//!
//! GPU-agnostic building blocks shared by the Vireo headset and renderer:
//!
//! - [`math`] - Pose and field-of-view conventions, projection helpers
//! - [`mesh`] - Merged vertex/index data provider and procedural shapes
//! - [`scene`] - Game objects drawn by the renderer
//! - [`time`] - Frame timer passed explicitly to the frame loop

pub mod math;
pub mod mesh;
pub mod scene;
pub mod time;

pub use math::{Fov, Pose};
pub use mesh::{MeshData, Model, Vertex};
pub use scene::GameObject;
pub use time::FrameTimer;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the core subsystem.
pub fn init() {
    log::info!("Vireo Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
