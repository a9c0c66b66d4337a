//! Graphics device.
//!
//! The [`GraphicsDevice`] is shared by every GPU resource owner through an
//! `Arc`. It outlives the resources because each of them holds a clone.

use ash::vk;

use crate::backend::vulkan::{command, VulkanContext};
use crate::backend::{DummyDevice, GpuFence, GpuSemaphore};
use crate::error::GraphicsError;
use crate::resources::align_up;

/// Device properties the renderer depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Minimum offset alignment for (dynamic) uniform buffer bindings.
    pub uniform_buffer_offset_alignment: u64,
    /// Sample count used for the color and depth targets.
    pub multisample_count: vk::SampleCountFlags,
}

/// The backend behind a [`GraphicsDevice`].
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum DeviceBackend {
    Dummy(DummyDevice),
    Vulkan(VulkanContext),
}

/// A graphics device for creating GPU resources.
#[derive(Debug)]
pub struct GraphicsDevice {
    backend: DeviceBackend,
    limits: DeviceLimits,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl GraphicsDevice {
    /// A device backed by a default [`DummyDevice`].
    pub fn dummy() -> Self {
        Self::from_dummy(DummyDevice::new())
    }

    pub fn from_dummy(dummy: DummyDevice) -> Self {
        let limits = DeviceLimits {
            uniform_buffer_offset_alignment: dummy.uniform_buffer_offset_alignment(),
            multisample_count: dummy.multisample_count(),
        };
        let memory_properties = dummy.memory_properties();

        log::info!("Graphics device: Dummy ({:?})", limits);

        Self {
            backend: DeviceBackend::Dummy(dummy),
            limits,
            memory_properties,
        }
    }

    /// Wrap a Vulkan context, reading alignment, sample count and memory types.
    pub fn from_vulkan(context: VulkanContext) -> Self {
        let properties = context.physical_device_properties();
        let limits = DeviceLimits {
            uniform_buffer_offset_alignment: properties
                .limits
                .min_uniform_buffer_offset_alignment
                .max(1),
            multisample_count: crate::backend::vulkan::device::select_multisample_count(
                &properties.limits,
            ),
        };
        let memory_properties = context.memory_properties();

        log::info!(
            "Graphics device: {} (uniform alignment: {}, samples: {:?})",
            context.device_name(),
            limits.uniform_buffer_offset_alignment,
            limits.multisample_count
        );

        Self {
            backend: DeviceBackend::Vulkan(context),
            limits,
            memory_properties,
        }
    }

    pub fn backend(&self) -> &DeviceBackend {
        &self.backend
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            DeviceBackend::Dummy(_) => "Dummy",
            DeviceBackend::Vulkan(_) => "Vulkan",
        }
    }

    pub fn as_dummy(&self) -> Option<&DummyDevice> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => Some(dummy),
            DeviceBackend::Vulkan(_) => None,
        }
    }

    pub fn as_vulkan(&self) -> Option<&VulkanContext> {
        match &self.backend {
            DeviceBackend::Vulkan(context) => Some(context),
            DeviceBackend::Dummy(_) => None,
        }
    }

    /// The logical Vulkan device, if any.
    pub fn vk_device(&self) -> Option<&ash::Device> {
        self.as_vulkan().map(VulkanContext::device)
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Round `size` up to the uniform buffer offset alignment.
    pub fn align_uniform(&self, size: u64) -> u64 {
        align_up(size, self.limits.uniform_buffer_offset_alignment)
    }

    /// Create a fence for CPU-GPU synchronization.
    pub fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => Ok(dummy.create_fence(signaled)),
            DeviceBackend::Vulkan(context) => {
                let flags = if signaled {
                    vk::FenceCreateFlags::SIGNALED
                } else {
                    vk::FenceCreateFlags::empty()
                };
                let fence_info = vk::FenceCreateInfo::default().flags(flags);
                let fence = unsafe { context.device().create_fence(&fence_info, None) }
                    .map_err(|e| GraphicsError::from_allocation(e, "Failed to create fence"))?;

                Ok(GpuFence::Vulkan {
                    device: context.device().clone(),
                    fence,
                })
            }
        }
    }

    /// Create a GPU semaphore for GPU-GPU synchronization.
    pub fn create_semaphore(&self) -> Result<GpuSemaphore, GraphicsError> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => Ok(dummy.create_semaphore()),
            DeviceBackend::Vulkan(context) => {
                let semaphore_info = vk::SemaphoreCreateInfo::default();
                let semaphore = unsafe { context.device().create_semaphore(&semaphore_info, None) }
                    .map_err(|e| GraphicsError::from_allocation(e, "Failed to create semaphore"))?;

                Ok(GpuSemaphore::Vulkan {
                    device: context.device().clone(),
                    semaphore,
                })
            }
        }
    }

    /// Create a command pool on the draw queue family with resettable buffers.
    pub fn create_command_pool(&self) -> Result<vk::CommandPool, GraphicsError> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => Ok(dummy.next_handle()),
            DeviceBackend::Vulkan(context) => command::create_command_pool(
                context.device(),
                context.draw_queue_family_index(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ),
        }
    }

    pub fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
    ) -> Result<vk::CommandBuffer, GraphicsError> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => Ok(dummy.next_handle()),
            DeviceBackend::Vulkan(context) => {
                command::allocate_command_buffer(context.device(), pool)
            }
        }
    }

    /// Submit a recorded command buffer to the draw queue.
    ///
    /// Waits on `wait` at the color attachment output stage, signals
    /// `signal`, and always signals `fence`.
    pub fn submit(
        &self,
        command_buffer: vk::CommandBuffer,
        wait: Option<&GpuSemaphore>,
        signal: Option<&GpuSemaphore>,
        fence: &GpuFence,
    ) -> Result<(), GraphicsError> {
        let wait_semaphores: Vec<vk::Semaphore> = wait.iter().map(|s| s.handle()).collect();
        let signal_semaphores: Vec<vk::Semaphore> = signal.iter().map(|s| s.handle()).collect();

        match &self.backend {
            DeviceBackend::Dummy(dummy) => {
                dummy.submit(command_buffer, wait_semaphores, signal_semaphores, fence);
                Ok(())
            }
            DeviceBackend::Vulkan(context) => {
                let wait_stages =
                    vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
                let command_buffers = [command_buffer];
                let submit_info = vk::SubmitInfo::default()
                    .wait_semaphores(&wait_semaphores)
                    .wait_dst_stage_mask(&wait_stages)
                    .command_buffers(&command_buffers)
                    .signal_semaphores(&signal_semaphores);

                unsafe {
                    context.device().queue_submit(
                        context.draw_queue(),
                        &[submit_info],
                        fence.handle(),
                    )
                }
                .map_err(|e| GraphicsError::GenericVulkan(format!("Queue submit failed: {:?}", e)))
            }
        }
    }

    /// Signal `fence` once previously submitted work completes, without new
    /// work. Used to hand back a fence whose submission failed.
    pub fn signal_fence(&self, fence: &GpuFence) -> Result<(), GraphicsError> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => {
                dummy.signal_fence(fence);
                Ok(())
            }
            DeviceBackend::Vulkan(context) => unsafe {
                context
                    .device()
                    .queue_submit(context.draw_queue(), &[], fence.handle())
            }
            .map_err(|e| GraphicsError::GenericVulkan(format!("Fence signal failed: {:?}", e))),
        }
    }

    /// Wait until the device has finished all submitted work.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        match &self.backend {
            DeviceBackend::Dummy(dummy) => {
                dummy.complete_submissions();
                Ok(())
            }
            DeviceBackend::Vulkan(context) => unsafe { context.device().device_wait_idle() }
                .map_err(|e| GraphicsError::GenericVulkan(format!("Device wait idle failed: {:?}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_device_reports_limits() {
        let device = GraphicsDevice::from_dummy(DummyDevice::new().with_uniform_alignment(64));
        assert_eq!(device.backend_name(), "Dummy");
        assert_eq!(device.limits().uniform_buffer_offset_alignment, 64);
        assert_eq!(device.align_uniform(80), 128);
        assert!(device.vk_device().is_none());
    }

    #[test]
    fn dummy_submit_signals_on_wait_idle() {
        let device = GraphicsDevice::dummy();
        let fence = device.create_fence(true).unwrap();
        let drawable = device.create_semaphore().unwrap();
        let presentable = device.create_semaphore().unwrap();
        let pool = device.create_command_pool().unwrap();
        let command_buffer = device.allocate_command_buffer(pool).unwrap();

        device
            .submit(command_buffer, Some(&drawable), Some(&presentable), &fence)
            .unwrap();
        assert!(!fence.is_signaled());

        device.wait_idle().unwrap();
        assert!(fence.is_signaled());

        let submission = &device.as_dummy().unwrap().submissions()[0];
        assert_eq!(submission.wait_semaphores, vec![drawable.handle()]);
        assert_eq!(submission.signal_semaphores, vec![presentable.handle()]);
    }
}
