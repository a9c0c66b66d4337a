//! Command buffer recording shared by both backends.

use ash::vk;

use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;

use super::DummyCommand;

/// Records draw commands into one command buffer.
///
/// Vulkan recording goes straight to the driver; dummy recording is kept by
/// the [`DummyDevice`](super::DummyDevice) until the next submission.
pub struct CommandRecorder<'a> {
    device: &'a GraphicsDevice,
    command_buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    /// Reset `command_buffer` and begin one-time recording.
    pub fn begin(
        device: &'a GraphicsDevice,
        command_buffer: vk::CommandBuffer,
    ) -> Result<Self, GraphicsError> {
        match device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.reset_recording(),
            DeviceBackend::Vulkan(context) => {
                let device = context.device();
                unsafe {
                    device
                        .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                        .map_err(|e| {
                            GraphicsError::GenericVulkan(format!(
                                "Failed to reset command buffer: {:?}",
                                e
                            ))
                        })?;

                    let begin_info = vk::CommandBufferBeginInfo::default()
                        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
                    device
                        .begin_command_buffer(command_buffer, &begin_info)
                        .map_err(|e| {
                            GraphicsError::GenericVulkan(format!(
                                "Failed to begin command buffer: {:?}",
                                e
                            ))
                        })?;
                }
            }
        }

        Ok(Self {
            device,
            command_buffer,
        })
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::BeginRenderPass {
                render_pass,
                framebuffer,
                extent,
            }),
            DeviceBackend::Vulkan(context) => {
                let begin_info = vk::RenderPassBeginInfo::default()
                    .render_pass(render_pass)
                    .framebuffer(framebuffer)
                    .render_area(vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent,
                    })
                    .clear_values(clear_values);
                unsafe {
                    context.device().cmd_begin_render_pass(
                        self.command_buffer,
                        &begin_info,
                        vk::SubpassContents::INLINE,
                    );
                }
            }
        }
    }

    /// Set the dynamic viewport and scissor to cover `extent`.
    pub fn set_viewport(&self, extent: vk::Extent2D) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::SetViewport { extent }),
            DeviceBackend::Vulkan(context) => {
                let viewport = vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                };
                let scissor = vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                };
                unsafe {
                    context
                        .device()
                        .cmd_set_viewport(self.command_buffer, 0, &[viewport]);
                    context
                        .device()
                        .cmd_set_scissor(self.command_buffer, 0, &[scissor]);
                }
            }
        }
    }

    /// Bind the merged buffer as vertex buffer at offset 0 and as `u32`
    /// index buffer at `index_offset`.
    pub fn bind_mesh(&self, buffer: vk::Buffer, index_offset: u64) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::BindMesh {
                buffer,
                index_offset,
            }),
            DeviceBackend::Vulkan(context) => unsafe {
                context
                    .device()
                    .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer], &[0]);
                context.device().cmd_bind_index_buffer(
                    self.command_buffer,
                    buffer,
                    index_offset,
                    vk::IndexType::UINT32,
                );
            },
        }
    }

    pub fn bind_descriptor_set(
        &self,
        layout: vk::PipelineLayout,
        descriptor_set: vk::DescriptorSet,
        dynamic_offset: u32,
    ) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::BindDescriptorSet {
                descriptor_set,
                dynamic_offset,
            }),
            DeviceBackend::Vulkan(context) => unsafe {
                context.device().cmd_bind_descriptor_sets(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[descriptor_set],
                    &[dynamic_offset],
                );
            },
        }
    }

    pub fn bind_pipeline(&self, pipeline: vk::Pipeline) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::BindPipeline { pipeline }),
            DeviceBackend::Vulkan(context) => unsafe {
                context.device().cmd_bind_pipeline(
                    self.command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline,
                );
            },
        }
    }

    pub fn draw_indexed(&self, index_count: u32, first_index: u32) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::DrawIndexed {
                index_count,
                first_index,
            }),
            DeviceBackend::Vulkan(context) => unsafe {
                context.device().cmd_draw_indexed(
                    self.command_buffer,
                    index_count,
                    1,
                    first_index,
                    0,
                    0,
                );
            },
        }
    }

    pub fn end_render_pass(&self) {
        match self.device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.record(DummyCommand::EndRenderPass),
            DeviceBackend::Vulkan(context) => unsafe {
                context.device().cmd_end_render_pass(self.command_buffer);
            },
        }
    }
}

/// Finish recording `command_buffer`.
pub fn end_command_buffer(
    device: &GraphicsDevice,
    command_buffer: vk::CommandBuffer,
) -> Result<(), GraphicsError> {
    if let DeviceBackend::Vulkan(context) = device.backend() {
        unsafe { context.device().end_command_buffer(command_buffer) }.map_err(|e| {
            GraphicsError::GenericVulkan(format!("Failed to end command buffer: {:?}", e))
        })?;
    }
    Ok(())
}
