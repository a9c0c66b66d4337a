//! Framebuffer over one swapchain image.

use std::sync::Arc;

use ash::vk;

use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;

use super::image::{create_image_view, GpuImage};
use super::render_pass::RenderPass;

/// One per swapchain image. The image itself belongs to the XR runtime's
/// swapchain and is never destroyed here; the derived view and the
/// framebuffer are.
pub struct RenderTarget {
    image: vk::Image,
    view: vk::ImageView,
    framebuffer: vk::Framebuffer,
    device: Arc<GraphicsDevice>,
}

impl RenderTarget {
    /// Build a framebuffer of `[color, depth, swapchain image]` for
    /// `render_pass`. The swapchain image holds one layer per eye.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        image: vk::Image,
        render_pass: &RenderPass,
        color: &GpuImage,
        depth: &GpuImage,
    ) -> Result<Self, GraphicsError> {
        let mut target = Self {
            image,
            view: vk::ImageView::null(),
            framebuffer: vk::Framebuffer::null(),
            device: Arc::clone(device),
        };

        match device.backend() {
            DeviceBackend::Dummy(dummy) => {
                target.view = dummy.next_handle();
                target.framebuffer = dummy.next_handle();
            }
            DeviceBackend::Vulkan(context) => {
                let vk_device = context.device();
                target.view = create_image_view(
                    vk_device,
                    image,
                    render_pass.color_format(),
                    vk::ImageAspectFlags::COLOR,
                    color.layer_count(),
                )?;

                let attachments = [color.view(), depth.view(), target.view];
                let extent = color.extent();
                // Multiview framebuffers have a single layer; the view mask
                // addresses the image layers.
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass.handle())
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);

                target.framebuffer =
                    unsafe { vk_device.create_framebuffer(&framebuffer_info, None) }.map_err(|e| {
                        GraphicsError::from_allocation(e, "Failed to create framebuffer")
                    })?;
            }
        }

        Ok(target)
    }

    /// The swapchain image this target renders into.
    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        if let Some(device) = self.device.vk_device() {
            unsafe {
                if self.framebuffer != vk::Framebuffer::null() {
                    device.destroy_framebuffer(self.framebuffer, None);
                }
                if self.view != vk::ImageView::null() {
                    device.destroy_image_view(self.view, None);
                }
            }
        }
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("image", &self.image)
            .field("framebuffer", &self.framebuffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ImageDescriptor;
    use ash::vk::Handle;

    #[test]
    fn dummy_target_borrows_swapchain_image() {
        let device = Arc::new(GraphicsDevice::dummy());
        let render_pass = RenderPass::multiview(
            &device,
            vk::Format::R8G8B8A8_SRGB,
            vk::Format::D32_SFLOAT,
            vk::SampleCountFlags::TYPE_4,
        )
        .unwrap();

        let descriptor = |format: vk::Format,
                          usage: vk::ImageUsageFlags,
                          aspect: vk::ImageAspectFlags| ImageDescriptor {
            extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            format,
            samples: vk::SampleCountFlags::TYPE_4,
            usage,
            aspect,
            layer_count: 2,
        };
        let color = GpuImage::new(
            &device,
            descriptor(
                vk::Format::R8G8B8A8_SRGB,
                vk::ImageUsageFlags::COLOR_ATTACHMENT,
                vk::ImageAspectFlags::COLOR,
            ),
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
        let depth = GpuImage::new(
            &device,
            descriptor(
                vk::Format::D32_SFLOAT,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                vk::ImageAspectFlags::DEPTH,
            ),
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();

        let swapchain_image = vk::Image::from_raw(0xdead);
        let target = RenderTarget::new(&device, swapchain_image, &render_pass, &color, &depth)
            .unwrap();

        assert_eq!(target.image(), swapchain_image);
        assert_ne!(target.framebuffer(), vk::Framebuffer::null());
    }
}
