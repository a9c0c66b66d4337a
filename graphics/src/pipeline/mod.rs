//! Graphics pipelines.
//!
//! A [`Pipeline`] is compiled once from a shader pair and a
//! [`PipelineState`] and never changes afterwards. Two pipelines are equal
//! when their [`PipelineDescriptor`]s are, which is what the renderer uses
//! to share pipelines between materials.

mod shader;

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use vireo_core::Vertex;

use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;
use crate::materials::{Material, PipelineState};

pub use shader::{load_spirv, SHADER_ENTRY_POINT};

/// Everything a pipeline is built from, compared structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDescriptor {
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub state: PipelineState,
}

impl PipelineDescriptor {
    pub fn from_material(material: &Material) -> Self {
        Self {
            vertex_shader: material.vertex_shader.clone(),
            fragment_shader: material.fragment_shader.clone(),
            state: material.state,
        }
    }
}

/// An immutable graphics pipeline.
pub struct Pipeline {
    pipeline: vk::Pipeline,
    descriptor: PipelineDescriptor,
    device: Arc<GraphicsDevice>,
}

impl Pipeline {
    /// Compile a pipeline for `render_pass` with shaders read from `shader_dir`.
    ///
    /// Missing or invalid shader files fail with
    /// [`GraphicsError::FileMissing`], on every backend.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
        descriptor: PipelineDescriptor,
    ) -> Result<Self, GraphicsError> {
        let vertex_code = load_spirv(&shader_dir.join(&descriptor.vertex_shader))?;
        let fragment_code = load_spirv(&shader_dir.join(&descriptor.fragment_shader))?;

        let pipeline = match device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.next_handle(),
            DeviceBackend::Vulkan(context) => create_graphics_pipeline(
                context.device(),
                layout,
                render_pass,
                device.limits().multisample_count,
                &vertex_code,
                &fragment_code,
                &descriptor.state,
            )?,
        };

        log::debug!(
            "Created pipeline {:?} ({} / {})",
            pipeline,
            descriptor.vertex_shader,
            descriptor.fragment_shader
        );

        Ok(Self {
            pipeline,
            descriptor,
            device: Arc::clone(device),
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// Whether this pipeline was built from `descriptor`.
    pub fn matches(&self, descriptor: &PipelineDescriptor) -> bool {
        self.descriptor == *descriptor
    }
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(device) = self.device.vk_device() {
            if self.pipeline != vk::Pipeline::null() {
                unsafe { device.destroy_pipeline(self.pipeline, None) };
            }
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pipeline", &self.pipeline)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// One interleaved vertex binding with position, normal and color.
fn vertex_input() -> (
    [vk::VertexInputBindingDescription; 1],
    [vk::VertexInputAttributeDescription; 3],
) {
    let binding = vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(std::mem::size_of::<Vertex>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX);

    let attributes = [0u32, 1, 2].map(|location| {
        vk::VertexInputAttributeDescription::default()
            .location(location)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(Vertex::ATTRIBUTE_OFFSETS[location as usize])
    });

    ([binding], attributes)
}

fn create_shader_module(
    device: &ash::Device,
    code: &[u32],
) -> Result<vk::ShaderModule, GraphicsError> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(|e| GraphicsError::FileMissing(format!("Failed to create shader module: {:?}", e)))
}

fn create_graphics_pipeline(
    device: &ash::Device,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    samples: vk::SampleCountFlags,
    vertex_code: &[u32],
    fragment_code: &[u32],
    state: &PipelineState,
) -> Result<vk::Pipeline, GraphicsError> {
    let vertex_module = create_shader_module(device, vertex_code)?;
    let fragment_module = match create_shader_module(device, fragment_code) {
        Ok(module) => module,
        Err(e) => {
            unsafe { device.destroy_shader_module(vertex_module, None) };
            return Err(e);
        }
    };

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(SHADER_ENTRY_POINT),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(SHADER_ENTRY_POINT),
    ];

    let (bindings, attributes) = vertex_input();
    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Dynamic viewport and scissor
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(state.cull_mode)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(samples);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(state.depth_test)
        .depth_write_enable(state.depth_write)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(true)
        .src_color_blend_factor(state.color_blend.src_factor)
        .dst_color_blend_factor(state.color_blend.dst_factor)
        .color_blend_op(state.color_blend.operation)
        .src_alpha_blend_factor(state.alpha_blend.src_factor)
        .dst_alpha_blend_factor(state.alpha_blend.dst_factor)
        .alpha_blend_op(state.alpha_blend.operation)
        .color_write_mask(vk::ColorComponentFlags::RGBA)];

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let result = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    };

    // Shader modules are baked into the pipeline; destroy them now.
    unsafe {
        device.destroy_shader_module(vertex_module, None);
        device.destroy_shader_module(fragment_module, None);
    }

    let pipelines = result.map_err(|(_, e)| {
        GraphicsError::GenericVulkan(format!("Failed to create graphics pipeline: {:?}", e))
    })?;

    pipelines.into_iter().next().ok_or_else(|| {
        GraphicsError::GenericVulkan("Pipeline creation returned nothing".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_compare_structurally() {
        let a = PipelineDescriptor::from_material(&Material::default());
        let b = PipelineDescriptor::from_material(
            &Material::default().with_color(glam::Vec4::new(1.0, 0.0, 0.0, 1.0)),
        );
        assert_eq!(a, b);

        let mut state = PipelineState::default();
        state.depth_write = false;
        let c = PipelineDescriptor::from_material(&Material::default().with_state(state));
        assert_ne!(a, c);

        let d = PipelineDescriptor::from_material(&Material::new("Diffuse.vert.spv", "Hud.frag.spv"));
        assert_ne!(a, d);
    }

    #[test]
    fn vertex_input_matches_vertex_layout() {
        let (bindings, attributes) = vertex_input();
        assert_eq!(bindings[0].stride, 36);
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
    }
}
