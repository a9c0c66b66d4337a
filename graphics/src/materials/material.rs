//! Material definition.

use ash::vk;
use glam::Vec4;

/// Blend factors and operation for either the color or the alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// Source factor.
    pub src_factor: vk::BlendFactor,
    /// Destination factor.
    pub dst_factor: vk::BlendFactor,
    /// Blend operation.
    pub operation: vk::BlendOp,
}

impl BlendComponent {
    /// Classic `src * a + dst * (1 - a)` blending.
    pub const ALPHA_BLENDING: Self = Self {
        src_factor: vk::BlendFactor::SRC_ALPHA,
        dst_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        operation: vk::BlendOp::ADD,
    };

    /// Source replaces destination.
    pub const REPLACE: Self = Self {
        src_factor: vk::BlendFactor::ONE,
        dst_factor: vk::BlendFactor::ZERO,
        operation: vk::BlendOp::ADD,
    };
}

/// Blend, cull and depth state baked into a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub color_blend: BlendComponent,
    pub alpha_blend: BlendComponent,
    pub cull_mode: vk::CullModeFlags,
    pub depth_test: bool,
    pub depth_write: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            color_blend: BlendComponent::ALPHA_BLENDING,
            alpha_blend: BlendComponent::REPLACE,
            cull_mode: vk::CullModeFlags::NONE,
            depth_test: true,
            depth_write: true,
        }
    }
}

/// A shader pair with its pipeline state and per-object color multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// SPIR-V file name of the vertex shader, relative to the shader directory.
    pub vertex_shader: String,
    /// SPIR-V file name of the fragment shader, relative to the shader directory.
    pub fragment_shader: String,
    pub color_multiplier: Vec4,
    pub state: PipelineState,
}

impl Material {
    pub const DEFAULT_VERTEX_SHADER: &'static str = "Diffuse.vert.spv";
    pub const DEFAULT_FRAGMENT_SHADER: &'static str = "Diffuse.frag.spv";

    pub fn new(vertex_shader: impl Into<String>, fragment_shader: impl Into<String>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            color_multiplier: Vec4::ONE,
            state: PipelineState::default(),
        }
    }

    pub fn with_color(mut self, color_multiplier: Vec4) -> Self {
        self.color_multiplier = color_multiplier;
        self
    }

    pub fn with_state(mut self, state: PipelineState) -> Self {
        self.state = state;
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VERTEX_SHADER, Self::DEFAULT_FRAGMENT_SHADER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state() {
        let state = PipelineState::default();
        assert_eq!(state.color_blend.src_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(state.color_blend.dst_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(state.alpha_blend.src_factor, vk::BlendFactor::ONE);
        assert_eq!(state.alpha_blend.dst_factor, vk::BlendFactor::ZERO);
        assert_eq!(state.cull_mode, vk::CullModeFlags::NONE);
        assert!(state.depth_test && state.depth_write);
    }

    #[test]
    fn default_material_uses_diffuse_shaders() {
        let material = Material::default();
        assert_eq!(material.vertex_shader, "Diffuse.vert.spv");
        assert_eq!(material.fragment_shader, "Diffuse.frag.spv");
        assert_eq!(material.color_multiplier, Vec4::ONE);
    }
}
