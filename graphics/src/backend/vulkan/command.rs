//! Vulkan command pool and buffer management.

use ash::vk;

use crate::error::GraphicsError;

/// Create a command pool whose buffers can be reset individually.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
    flags: vk::CommandPoolCreateFlags,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(flags);

    unsafe { device.create_command_pool(&pool_info, None) }
        .map_err(|e| GraphicsError::from_allocation(e, "Failed to create command pool"))
}

/// Allocate one primary command buffer from `pool`.
pub fn allocate_command_buffer(
    device: &ash::Device,
    pool: vk::CommandPool,
) -> Result<vk::CommandBuffer, GraphicsError> {
    let allocate_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.allocate_command_buffers(&allocate_info) }
        .map_err(|e| GraphicsError::from_allocation(e, "Failed to allocate command buffer"))?;

    buffers.into_iter().next().ok_or_else(|| {
        GraphicsError::GenericVulkan("Command buffer allocation returned nothing".to_string())
    })
}

/// Record with `record`, submit to `queue` and block until the queue is idle.
///
/// Uses a transient pool that is destroyed before returning.
pub fn submit_one_time<F>(
    device: &ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    record: F,
) -> Result<(), GraphicsError>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let pool = create_command_pool(
        device,
        queue_family_index,
        vk::CommandPoolCreateFlags::TRANSIENT,
    )?;

    let result = (|| {
        let command_buffer = allocate_command_buffer(device, pool)?;
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| {
                    GraphicsError::GenericVulkan(format!("Failed to begin command buffer: {:?}", e))
                })?;

            record(device, command_buffer);

            device.end_command_buffer(command_buffer).map_err(|e| {
                GraphicsError::GenericVulkan(format!("Failed to end command buffer: {:?}", e))
            })?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .map_err(|e| GraphicsError::GenericVulkan(format!("Queue submit failed: {:?}", e)))?;
            device.queue_wait_idle(queue).map_err(|e| {
                GraphicsError::GenericVulkan(format!("Queue wait idle failed: {:?}", e))
            })?;
        }
        Ok(())
    })();

    unsafe { device.destroy_command_pool(pool, None) };
    result
}
