//! Multi-buffered stereo rendering.
//!
//! The [`Renderer`] rotates through a ring of [`FrameRenderProcess`]es. Each
//! frame it writes the per-object, per-eye and per-frame uniform blocks of
//! the next slot, records one multiview render pass into the slot's command
//! buffer and, on [`submit`](Renderer::submit), hands it to the draw queue.
//!
//! Construction errors are returned to the caller. Errors inside `render`
//! and `submit` drop the frame instead: they are logged, counted in
//! [`dropped_frames`](Renderer::dropped_frames), and the next frame starts
//! fresh.

mod frame;
mod ring;
mod uniforms;

use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3};
use vireo_core::{GameObject, MeshData};

use crate::backend::recorder::{end_command_buffer, CommandRecorder};
use crate::backend::{GpuFence, GpuSemaphore};
use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;
use crate::materials::Material;
use crate::pipeline::{Pipeline, PipelineDescriptor};
use crate::resources::GpuBuffer;

pub use frame::FrameRenderProcess;
pub use ring::FrameRing;
pub use uniforms::{
    DynamicUniformData, StaticFragmentUniformData, StaticVertexUniformData, UniformLayout,
};

/// What the renderer needs from the stereo display it draws into.
pub trait StereoTarget {
    fn eye_count(&self) -> usize;
    fn eye_resolution(&self, eye: usize) -> vk::Extent2D;
    fn eye_view_matrix(&self, eye: usize) -> Mat4;
    fn eye_projection_matrix(&self, eye: usize) -> Mat4;
    fn render_pass(&self) -> vk::RenderPass;
    /// Framebuffer of the swapchain image at `swapchain_image_index`.
    fn framebuffer(&self, swapchain_image_index: usize) -> Option<vk::Framebuffer>;
}

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Number of frames the CPU may record ahead of the GPU. At least 1.
    pub frames_in_flight: usize,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    /// Directory the material shader files are read from.
    pub shader_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            clear_depth: 1.0,
            shader_dir: PathBuf::from("shaders"),
        }
    }
}

/// Command pool, descriptor pool and layouts shared by the frame processes.
struct SharedObjects {
    command_pool: vk::CommandPool,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    device: Arc<GraphicsDevice>,
}

impl SharedObjects {
    fn new(device: &Arc<GraphicsDevice>, frames_in_flight: u32) -> Result<Self, GraphicsError> {
        let mut shared = Self {
            command_pool: vk::CommandPool::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            device: Arc::clone(device),
        };
        shared.command_pool = device.create_command_pool()?;

        let context = match device.backend() {
            DeviceBackend::Dummy(dummy) => {
                shared.descriptor_set_layout = dummy.next_handle();
                shared.descriptor_pool = dummy.next_handle();
                shared.pipeline_layout = dummy.next_handle();
                return Ok(shared);
            }
            DeviceBackend::Vulkan(context) => context,
        };
        let vk_device = context.device();

        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX),
            vk::DescriptorSetLayoutBinding::default()
                .binding(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX),
            vk::DescriptorSetLayoutBinding::default()
                .binding(2)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
        ];
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        shared.descriptor_set_layout =
            unsafe { vk_device.create_descriptor_set_layout(&layout_info, None) }.map_err(|e| {
                GraphicsError::from_allocation(e, "Failed to create descriptor set layout")
            })?;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: frames_in_flight,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: frames_in_flight * 2,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(frames_in_flight);
        shared.descriptor_pool = unsafe { vk_device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| GraphicsError::from_allocation(e, "Failed to create descriptor pool"))?;

        let set_layouts = [shared.descriptor_set_layout];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        shared.pipeline_layout =
            unsafe { vk_device.create_pipeline_layout(&pipeline_layout_info, None) }
                .map_err(|e| GraphicsError::from_allocation(e, "Failed to create pipeline layout"))?;

        Ok(shared)
    }
}

impl Drop for SharedObjects {
    fn drop(&mut self) {
        if let Some(device) = self.device.vk_device() {
            unsafe {
                if self.pipeline_layout != vk::PipelineLayout::null() {
                    device.destroy_pipeline_layout(self.pipeline_layout, None);
                }
                if self.descriptor_pool != vk::DescriptorPool::null() {
                    device.destroy_descriptor_pool(self.descriptor_pool, None);
                }
                if self.descriptor_set_layout != vk::DescriptorSetLayout::null() {
                    device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
                }
                if self.command_pool != vk::CommandPool::null() {
                    device.destroy_command_pool(self.command_pool, None);
                }
            }
        }
    }
}

/// Draws game objects into a [`StereoTarget`] with frames in flight.
pub struct Renderer {
    processes: FrameRing<FrameRenderProcess>,
    pipelines: Vec<Pipeline>,
    /// Pipeline index for each material.
    material_pipelines: Vec<usize>,
    materials: Vec<Material>,
    mesh_buffer: GpuBuffer,
    index_offset: u64,
    uniform_layout: UniformLayout,
    /// Dropped after the processes and pipelines that use it.
    shared: SharedObjects,
    config: RendererConfig,
    recording: bool,
    dropped_frames: u64,
    device: Arc<GraphicsDevice>,
}

impl Renderer {
    /// Build the frame ring, the pipelines and the merged mesh buffer.
    ///
    /// `object_count` is the number of objects the uniform buffers are
    /// sized for. The mesh is uploaded synchronously.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        render_pass: vk::RenderPass,
        config: RendererConfig,
        materials: Vec<Material>,
        mesh: &MeshData,
        object_count: usize,
    ) -> Result<Self, GraphicsError> {
        if config.frames_in_flight == 0 {
            return Err(GraphicsError::InvalidParameter(
                "frames in flight must be at least 1".to_string(),
            ));
        }

        let (mesh_buffer, index_offset) = upload_mesh(device, mesh)?;
        let shared = SharedObjects::new(device, config.frames_in_flight as u32)?;
        let uniform_layout =
            UniformLayout::new(object_count, device.limits().uniform_buffer_offset_alignment);

        let processes = (0..config.frames_in_flight)
            .map(|_| {
                FrameRenderProcess::new(
                    device,
                    shared.command_pool,
                    shared.descriptor_pool,
                    shared.descriptor_set_layout,
                    uniform_layout,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let processes = FrameRing::new(processes)?;

        let (pipelines, material_pipelines) = create_pipelines(
            device,
            shared.pipeline_layout,
            render_pass,
            &config,
            &materials,
        )?;

        log::info!(
            "Renderer created: {} frames in flight, {} objects, {} materials, {} pipelines",
            processes.len(),
            object_count,
            materials.len(),
            pipelines.len()
        );

        Ok(Self {
            processes,
            pipelines,
            material_pipelines,
            materials,
            mesh_buffer,
            index_offset,
            uniform_layout,
            shared,
            config,
            recording: false,
            dropped_frames: 0,
            device: Arc::clone(device),
        })
    }

    /// Record one frame of `objects` into the next frame process.
    ///
    /// Waits for the slot's previous GPU work before reusing it. The busy
    /// fence stays signaled until [`submit`](Self::submit), so a failed or
    /// unsubmitted frame never leaves the slot waiting on work that does not
    /// exist. Failures drop the frame.
    pub fn render(
        &mut self,
        target: &dyn StereoTarget,
        objects: &[GameObject],
        camera_matrix: Mat4,
        swapchain_image_index: usize,
        time: f32,
        light_direction: Vec3,
    ) {
        self.recording = false;
        match self.try_render(
            target,
            objects,
            camera_matrix,
            swapchain_image_index,
            time,
            light_direction,
        ) {
            Ok(()) => self.recording = true,
            Err(e) => self.drop_frame("render", &e),
        }
    }

    fn try_render(
        &mut self,
        target: &dyn StereoTarget,
        objects: &[GameObject],
        camera_matrix: Mat4,
        swapchain_image_index: usize,
        time: f32,
        light_direction: Vec3,
    ) -> Result<(), GraphicsError> {
        if objects.len() > self.uniform_layout.object_count {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} objects but uniform buffers hold {}",
                objects.len(),
                self.uniform_layout.object_count
            )));
        }
        let framebuffer = target.framebuffer(swapchain_image_index).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!(
                "no render target for swapchain image {}",
                swapchain_image_index
            ))
        })?;

        self.processes.advance();
        let process = self.processes.current_mut();

        if !process.busy_fence().wait(u64::MAX)? {
            return Err(GraphicsError::GenericVulkan("Fence wait timed out".to_string()));
        }

        for (data, object) in process.dynamic_data.iter_mut().zip(objects) {
            data.world_matrix = object.world_matrix;
            data.color_multiplier = self
                .materials
                .get(object.material)
                .map(|material| material.color_multiplier)
                .unwrap_or(glam::Vec4::ONE);
        }
        for (eye, view_projection) in process
            .static_vertex_data
            .view_projection
            .iter_mut()
            .enumerate()
            .take(target.eye_count())
        {
            *view_projection =
                target.eye_projection_matrix(eye) * target.eye_view_matrix(eye) * camera_matrix;
        }
        process.static_fragment_data = StaticFragmentUniformData::new(time, light_direction);
        process.update_uniform_data()?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.config.clear_depth,
                    stencil: 0,
                },
            },
        ];
        // Both views of the multiview pass share one extent.
        let extent = target.eye_resolution(0);
        if (1..target.eye_count()).any(|eye| target.eye_resolution(eye) != extent) {
            return Err(GraphicsError::InvalidParameter(format!(
                "eye resolutions differ, multiview needs one extent ({}x{} for eye 0)",
                extent.width, extent.height
            )));
        }

        let recorder = CommandRecorder::begin(&self.device, process.command_buffer())?;
        recorder.begin_render_pass(target.render_pass(), framebuffer, extent, &clear_values);
        recorder.set_viewport(extent);
        recorder.bind_mesh(self.mesh_buffer.handle(), self.index_offset);

        for (index, object) in objects.iter().enumerate() {
            if !object.visible {
                continue;
            }
            let Some(pipeline) = self
                .material_pipelines
                .get(object.material)
                .and_then(|&pipeline| self.pipelines.get(pipeline))
            else {
                log::warn!(
                    "Object '{}' uses unknown material {}",
                    object.name,
                    object.material
                );
                continue;
            };

            recorder.bind_descriptor_set(
                self.shared.pipeline_layout,
                process.descriptor_set(),
                self.uniform_layout.dynamic_offset(index),
            );
            recorder.bind_pipeline(pipeline.handle());
            recorder.draw_indexed(object.model.index_count, object.model.first_index);
        }

        recorder.end_render_pass();
        Ok(())
    }

    /// End recording and submit the current frame process.
    ///
    /// The busy fence is always signaled. With `use_semaphores` the
    /// submission also waits on the drawable semaphore and signals the
    /// presentable one, for callers that present the frame themselves.
    pub fn submit(&mut self, use_semaphores: bool) {
        if !std::mem::take(&mut self.recording) {
            log::trace!("Nothing recorded, skipping submit");
            return;
        }
        if let Err(e) = self.try_submit(use_semaphores) {
            self.drop_frame("submit", &e);
        }
    }

    fn try_submit(&self, use_semaphores: bool) -> Result<(), GraphicsError> {
        let process = self.processes.current();
        end_command_buffer(&self.device, process.command_buffer())?;

        let fence = process.busy_fence();
        fence.reset()?;

        let (wait, signal) = if use_semaphores {
            (
                Some(process.drawable_semaphore()),
                Some(process.presentable_semaphore()),
            )
        } else {
            (None, None)
        };
        self.device
            .submit(process.command_buffer(), wait, signal, fence)
            .inspect_err(|_| {
                if let Err(e) = self.device.signal_fence(fence) {
                    log::warn!("Failed to release frame fence after submit error: {}", e);
                }
            })
    }

    fn drop_frame(&mut self, stage: &str, error: &GraphicsError) {
        self.dropped_frames += 1;
        log::warn!(
            "Dropped frame in {} ({} so far): {}",
            stage,
            self.dropped_frames,
            error
        );
    }

    /// Number of frames dropped by `render` or `submit` failures.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn current_frame_index(&self) -> usize {
        self.processes.current_index()
    }

    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        self.processes.current().command_buffer()
    }

    pub fn current_drawable_semaphore(&self) -> &GpuSemaphore {
        self.processes.current().drawable_semaphore()
    }

    pub fn current_presentable_semaphore(&self) -> &GpuSemaphore {
        self.processes.current().presentable_semaphore()
    }

    pub fn current_fence(&self) -> &GpuFence {
        self.processes.current().busy_fence()
    }

    pub fn frame_process(&self, index: usize) -> Option<&FrameRenderProcess> {
        self.processes.get(index)
    }

    pub fn frames_in_flight(&self) -> usize {
        self.processes.len()
    }

    pub fn uniform_layout(&self) -> &UniformLayout {
        &self.uniform_layout
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// Pipeline used by the material at `material`.
    pub fn material_pipeline(&self, material: usize) -> Option<&Pipeline> {
        self.material_pipelines
            .get(material)
            .and_then(|&index| self.pipelines.get(index))
    }

    pub fn mesh_buffer(&self) -> &GpuBuffer {
        &self.mesh_buffer
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.shared.pipeline_layout
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        for process in self.processes.iter() {
            if let Err(e) = process.busy_fence().wait(u64::MAX) {
                log::warn!("Frame process still busy at teardown: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("frames_in_flight", &self.processes.len())
            .field("pipelines", &self.pipelines.len())
            .field("uniform_layout", &self.uniform_layout)
            .field("dropped_frames", &self.dropped_frames)
            .finish_non_exhaustive()
    }
}

/// One pipeline per distinct shader pair and state, found by linear scan.
fn create_pipelines(
    device: &Arc<GraphicsDevice>,
    pipeline_layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    config: &RendererConfig,
    materials: &[Material],
) -> Result<(Vec<Pipeline>, Vec<usize>), GraphicsError> {
    let mut pipelines: Vec<Pipeline> = Vec::new();
    let mut material_pipelines = Vec::with_capacity(materials.len());

    for material in materials {
        let descriptor = PipelineDescriptor::from_material(material);
        let index = match pipelines.iter().position(|p| p.matches(&descriptor)) {
            Some(index) => index,
            None => {
                pipelines.push(Pipeline::new(
                    device,
                    pipeline_layout,
                    render_pass,
                    &config.shader_dir,
                    descriptor,
                )?);
                pipelines.len() - 1
            }
        };
        material_pipelines.push(index);
    }

    Ok((pipelines, material_pipelines))
}

/// Upload the merged vertex and index data into a device-local buffer.
fn upload_mesh(
    device: &Arc<GraphicsDevice>,
    mesh: &MeshData,
) -> Result<(GpuBuffer, u64), GraphicsError> {
    if mesh.is_empty() {
        return Err(GraphicsError::InvalidParameter(
            "mesh data has no indices".to_string(),
        ));
    }
    let size = mesh.size() as u64;

    let mut staging = GpuBuffer::new(
        device,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        size,
    )?;
    mesh.write_to(staging.map()?);
    staging.unmap();

    let mut mesh_buffer = GpuBuffer::new(
        device,
        vk::BufferUsageFlags::VERTEX_BUFFER
            | vk::BufferUsageFlags::INDEX_BUFFER
            | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        size,
    )?;
    staging.copy_to(&mut mesh_buffer)?;

    log::debug!(
        "Uploaded mesh data: {} bytes, indices at {}",
        size,
        mesh.index_offset()
    );
    Ok((mesh_buffer, mesh.index_offset() as u64))
}
