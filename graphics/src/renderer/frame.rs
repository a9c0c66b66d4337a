//! Per-frame-in-flight render state.

use std::mem::size_of;
use std::sync::Arc;

use ash::vk;

use crate::backend::{GpuFence, GpuSemaphore};
use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;
use crate::resources::GpuBuffer;

use super::uniforms::{
    DynamicUniformData, StaticFragmentUniformData, StaticVertexUniformData, UniformLayout,
};

/// The command buffer, synchronization objects, descriptor set and
/// persistently mapped uniform buffer of one frame in flight.
///
/// The busy fence guards everything else: it has to be signaled before the
/// command buffer is reset or the uniform memory is overwritten.
pub struct FrameRenderProcess {
    command_buffer: vk::CommandBuffer,
    drawable_semaphore: GpuSemaphore,
    presentable_semaphore: GpuSemaphore,
    busy_fence: GpuFence,
    descriptor_set: vk::DescriptorSet,
    uniform_buffer: GpuBuffer,
    layout: UniformLayout,
    pub dynamic_data: Vec<DynamicUniformData>,
    pub static_vertex_data: StaticVertexUniformData,
    pub static_fragment_data: StaticFragmentUniformData,
}

impl FrameRenderProcess {
    pub fn new(
        device: &Arc<GraphicsDevice>,
        command_pool: vk::CommandPool,
        descriptor_pool: vk::DescriptorPool,
        descriptor_set_layout: vk::DescriptorSetLayout,
        layout: UniformLayout,
    ) -> Result<Self, GraphicsError> {
        let command_buffer = device.allocate_command_buffer(command_pool)?;
        let drawable_semaphore = device.create_semaphore()?;
        let presentable_semaphore = device.create_semaphore()?;
        // Signaled, so that the first use of the slot does not block.
        let busy_fence = device.create_fence(true)?;

        let mut uniform_buffer = GpuBuffer::new(
            device,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            layout.size,
        )?;
        uniform_buffer.map()?;

        let descriptor_set = allocate_descriptor_set(
            device,
            descriptor_pool,
            descriptor_set_layout,
            uniform_buffer.handle(),
            &layout,
        )?;

        Ok(Self {
            command_buffer,
            drawable_semaphore,
            presentable_semaphore,
            busy_fence,
            descriptor_set,
            uniform_buffer,
            layout,
            dynamic_data: vec![DynamicUniformData::default(); layout.object_count],
            static_vertex_data: StaticVertexUniformData::default(),
            static_fragment_data: StaticFragmentUniformData::default(),
        })
    }

    /// Copy the three uniform regions into the mapped buffer.
    pub fn update_uniform_data(&mut self) -> Result<(), GraphicsError> {
        let layout = self.layout;
        let mapping = self.uniform_buffer.mapped_slice().ok_or_else(|| {
            GraphicsError::InvalidParameter("uniform buffer is not mapped".to_string())
        })?;

        layout.write(
            mapping,
            &self.dynamic_data,
            &self.static_vertex_data,
            &self.static_fragment_data,
        );
        Ok(())
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn drawable_semaphore(&self) -> &GpuSemaphore {
        &self.drawable_semaphore
    }

    pub fn presentable_semaphore(&self) -> &GpuSemaphore {
        &self.presentable_semaphore
    }

    pub fn busy_fence(&self) -> &GpuFence {
        &self.busy_fence
    }

    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    pub fn uniform_buffer(&self) -> &GpuBuffer {
        &self.uniform_buffer
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }
}

impl std::fmt::Debug for FrameRenderProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderProcess")
            .field("command_buffer", &self.command_buffer)
            .field("busy_fence", &self.busy_fence)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Allocate a set and point its three bindings at the uniform buffer.
fn allocate_descriptor_set(
    device: &GraphicsDevice,
    pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,
    uniform_buffer: vk::Buffer,
    layout: &UniformLayout,
) -> Result<vk::DescriptorSet, GraphicsError> {
    let context = match device.backend() {
        DeviceBackend::Dummy(dummy) => return Ok(dummy.next_handle()),
        DeviceBackend::Vulkan(context) => context,
    };
    let vk_device = context.device();

    let set_layouts = [set_layout];
    let allocate_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&set_layouts);
    let descriptor_set = unsafe { vk_device.allocate_descriptor_sets(&allocate_info) }
        .map_err(|e| GraphicsError::from_allocation(e, "Failed to allocate descriptor set"))?
        .into_iter()
        .next()
        .ok_or_else(|| {
            GraphicsError::GenericVulkan("Descriptor set allocation returned nothing".to_string())
        })?;

    let dynamic_info = [vk::DescriptorBufferInfo {
        buffer: uniform_buffer,
        offset: 0,
        range: size_of::<DynamicUniformData>() as u64,
    }];
    let vertex_info = [vk::DescriptorBufferInfo {
        buffer: uniform_buffer,
        offset: layout.static_vertex_offset,
        range: size_of::<StaticVertexUniformData>() as u64,
    }];
    let fragment_info = [vk::DescriptorBufferInfo {
        buffer: uniform_buffer,
        offset: layout.static_fragment_offset,
        range: size_of::<StaticFragmentUniformData>() as u64,
    }];

    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .buffer_info(&dynamic_info),
        vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&vertex_info),
        vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(2)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&fragment_info),
    ];
    unsafe { vk_device.update_descriptor_sets(&writes, &[]) };

    Ok(descriptor_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_process_is_idle_and_mapped() {
        let device = Arc::new(GraphicsDevice::dummy());
        let pool = device.create_command_pool().unwrap();
        let process = FrameRenderProcess::new(
            &device,
            pool,
            vk::DescriptorPool::null(),
            vk::DescriptorSetLayout::null(),
            UniformLayout::new(3, 256),
        )
        .unwrap();

        assert!(process.busy_fence().is_signaled());
        assert!(process.uniform_buffer().is_mapped());
        assert_eq!(process.uniform_buffer().size(), UniformLayout::new(3, 256).size);
        assert_eq!(process.dynamic_data.len(), 3);
        assert_ne!(
            process.drawable_semaphore().handle(),
            process.presentable_semaphore().handle()
        );
    }
}
