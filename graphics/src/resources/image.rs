//! GPU image resource.

use std::sync::Arc;

use ash::vk;

use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;

use super::memory::find_memory_type;

/// Parameters for a [`GpuImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
    /// One layer per eye is the usual case.
    pub layer_count: u32,
}

impl ImageDescriptor {
    /// View type matching the layer count.
    pub fn view_type(&self) -> vk::ImageViewType {
        view_type(self.layer_count)
    }
}

fn view_type(layer_count: u32) -> vk::ImageViewType {
    if layer_count > 1 {
        vk::ImageViewType::TYPE_2D_ARRAY
    } else {
        vk::ImageViewType::TYPE_2D
    }
}

/// Device memory bound to a 2-D image, plus a view over all of its layers.
pub struct GpuImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    descriptor: ImageDescriptor,
    device: Arc<GraphicsDevice>,
}

impl GpuImage {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        descriptor: ImageDescriptor,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self, GraphicsError> {
        if descriptor.layer_count == 0
            || descriptor.extent.width == 0
            || descriptor.extent.height == 0
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "image extent {:?} with {} layers",
                descriptor.extent, descriptor.layer_count
            )));
        }

        let mut image = Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            descriptor,
            device: Arc::clone(device),
        };

        match device.backend() {
            DeviceBackend::Dummy(dummy) => {
                find_memory_type(device.memory_properties(), u32::MAX, properties)?;
                image.image = dummy.next_handle();
                image.memory = dummy.next_handle();
                image.view = dummy.next_handle();
                log::trace!("DummyDevice: creating image {:?}", descriptor);
            }
            DeviceBackend::Vulkan(context) => {
                let vk_device = context.device();
                let image_info = vk::ImageCreateInfo::default()
                    .image_type(vk::ImageType::TYPE_2D)
                    .format(descriptor.format)
                    .extent(vk::Extent3D {
                        width: descriptor.extent.width,
                        height: descriptor.extent.height,
                        depth: 1,
                    })
                    .mip_levels(1)
                    .array_layers(descriptor.layer_count)
                    .samples(descriptor.samples)
                    .tiling(vk::ImageTiling::OPTIMAL)
                    .usage(descriptor.usage)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .initial_layout(vk::ImageLayout::UNDEFINED);

                image.image = unsafe { vk_device.create_image(&image_info, None) }
                    .map_err(|e| GraphicsError::from_allocation(e, "Failed to create image"))?;

                let requirements = unsafe { vk_device.get_image_memory_requirements(image.image) };
                let memory_type_index = find_memory_type(
                    device.memory_properties(),
                    requirements.memory_type_bits,
                    properties,
                )?;

                let allocate_info = vk::MemoryAllocateInfo::default()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                image.memory = unsafe { vk_device.allocate_memory(&allocate_info, None) }
                    .map_err(|e| GraphicsError::from_allocation(e, "Failed to allocate image memory"))?;

                unsafe { vk_device.bind_image_memory(image.image, image.memory, 0) }.map_err(|e| {
                    GraphicsError::GenericVulkan(format!("Failed to bind image memory: {:?}", e))
                })?;

                image.view = create_image_view(
                    vk_device,
                    image.image,
                    descriptor.format,
                    descriptor.aspect,
                    descriptor.layer_count,
                )?;
            }
        }

        Ok(image)
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.descriptor.extent
    }

    pub fn layer_count(&self) -> u32 {
        self.descriptor.layer_count
    }
}

/// Create a view over every layer of `image`, single or array by layer count.
pub(crate) fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    layer_count: u32,
) -> Result<vk::ImageView, GraphicsError> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type(layer_count))
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count,
        });

    unsafe { device.create_image_view(&view_info, None) }
        .map_err(|e| GraphicsError::from_allocation(e, "Failed to create image view"))
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        if let Some(device) = self.device.vk_device() {
            unsafe {
                if self.view != vk::ImageView::null() {
                    device.destroy_image_view(self.view, None);
                }
                if self.image != vk::Image::null() {
                    device.destroy_image(self.image, None);
                }
                if self.memory != vk::DeviceMemory::null() {
                    device.free_memory(self.memory, None);
                }
            }
        }
    }
}

impl std::fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuImage")
            .field("image", &self.image)
            .field("view", &self.view)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn descriptor(layer_count: u32) -> ImageDescriptor {
        ImageDescriptor {
            extent: vk::Extent2D {
                width: 1832,
                height: 1920,
            },
            format: vk::Format::D32_SFLOAT,
            samples: vk::SampleCountFlags::TYPE_4,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            layer_count,
        }
    }

    #[rstest]
    #[case(1, vk::ImageViewType::TYPE_2D)]
    #[case(2, vk::ImageViewType::TYPE_2D_ARRAY)]
    fn view_type_follows_layer_count(#[case] layers: u32, #[case] expected: vk::ImageViewType) {
        assert_eq!(descriptor(layers).view_type(), expected);
    }

    #[test]
    fn dummy_image_has_view() {
        let device = Arc::new(GraphicsDevice::dummy());
        let image =
            GpuImage::new(&device, descriptor(2), vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_ne!(image.view(), vk::ImageView::null());
        assert_eq!(image.layer_count(), 2);
    }

    #[test]
    fn zero_layers_are_invalid() {
        let device = Arc::new(GraphicsDevice::dummy());
        assert!(
            GpuImage::new(&device, descriptor(0), vk::MemoryPropertyFlags::DEVICE_LOCAL).is_err()
        );
    }
}
