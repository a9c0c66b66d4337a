//! Stereo multiview render pass.

use std::sync::Arc;

use ash::vk;

use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;

/// Both eyes are rendered by one subpass through view mask bits 0 and 1.
pub const STEREO_VIEW_MASK: u32 = 0b11;

/// Attachment order shared by the render pass and every framebuffer.
pub const COLOR_ATTACHMENT: u32 = 0;
pub const DEPTH_ATTACHMENT: u32 = 1;
pub const RESOLVE_ATTACHMENT: u32 = 2;

/// A single-subpass multiview render pass with multisampled color and
/// depth attachments resolving into a single-sample target.
pub struct RenderPass {
    render_pass: vk::RenderPass,
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    device: Arc<GraphicsDevice>,
}

impl RenderPass {
    pub fn multiview(
        device: &Arc<GraphicsDevice>,
        color_format: vk::Format,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Result<Self, GraphicsError> {
        let render_pass = match device.backend() {
            DeviceBackend::Dummy(dummy) => dummy.next_handle(),
            DeviceBackend::Vulkan(context) => {
                create_multiview_render_pass(context.device(), color_format, depth_format, samples)?
            }
        };

        Ok(Self {
            render_pass,
            color_format,
            depth_format,
            samples,
            device: Arc::clone(device),
        })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }
}

fn create_multiview_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> Result<vk::RenderPass, GraphicsError> {
    let attachments = [
        // Multisampled color
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        // Multisampled depth
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        // Single-sample resolve into the swapchain image
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
    ];

    let color_references = [vk::AttachmentReference {
        attachment: COLOR_ATTACHMENT,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_reference = vk::AttachmentReference {
        attachment: DEPTH_ATTACHMENT,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let resolve_references = [vk::AttachmentReference {
        attachment: RESOLVE_ATTACHMENT,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_references)
        .depth_stencil_attachment(&depth_reference)
        .resolve_attachments(&resolve_references)];

    let view_masks = [STEREO_VIEW_MASK];
    let correlation_masks = [STEREO_VIEW_MASK];
    let mut multiview_info = vk::RenderPassMultiviewCreateInfo::default()
        .view_masks(&view_masks)
        .correlation_masks(&correlation_masks);

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .push_next(&mut multiview_info);

    unsafe { device.create_render_pass(&create_info, None) }
        .map_err(|e| GraphicsError::from_allocation(e, "Failed to create render pass"))
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        if let Some(device) = self.device.vk_device() {
            if self.render_pass != vk::RenderPass::null() {
                unsafe { device.destroy_render_pass(self.render_pass, None) };
            }
        }
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("render_pass", &self.render_pass)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}
