//! GPU buffer resource.

use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;

use crate::backend::vulkan::command;
use crate::device::{DeviceBackend, GraphicsDevice};
use crate::error::GraphicsError;

use super::memory::find_memory_type;

/// Device memory bound to a linear buffer.
///
/// The memory is bound once, right after allocation. A host-visible buffer
/// can be mapped once and kept mapped for its whole lifetime, which is how
/// per-frame uniform staging areas are used.
///
/// # Example
///
/// ```ignore
/// let mut buffer = GpuBuffer::new(&device, vk::BufferUsageFlags::UNIFORM_BUFFER,
///     vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT, 1024)?;
/// buffer.map()?.copy_from_slice(&[0u8; 1024]);
/// ```
pub struct GpuBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: u64,
    properties: vk::MemoryPropertyFlags,
    mapped: Option<NonNull<u8>>,
    /// Backing store of the dummy backend.
    host: Vec<u8>,
    device: Arc<GraphicsDevice>,
}

// SAFETY: the mapped pointer is only dereferenced through `&mut self`, and the
// mapping belongs to memory owned by this buffer.
unsafe impl Send for GpuBuffer {}
unsafe impl Sync for GpuBuffer {}

static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);

impl GpuBuffer {
    /// Create a buffer of `size` bytes in memory with all of `properties`.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        size: u64,
    ) -> Result<Self, GraphicsError> {
        if size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }

        let mut buffer = Self {
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            size,
            properties,
            mapped: None,
            host: Vec::new(),
            device: Arc::clone(device),
        };

        match device.backend() {
            DeviceBackend::Dummy(dummy) => {
                find_memory_type(device.memory_properties(), u32::MAX, properties)?;
                buffer.buffer = dummy.next_handle();
                buffer.memory = dummy.next_handle();
                buffer.host = vec![0; size as usize];
                log::trace!("DummyDevice: creating buffer ({} bytes, {:?})", size, usage);
            }
            DeviceBackend::Vulkan(context) => {
                let vk_device = context.device();
                let buffer_info = vk::BufferCreateInfo::default()
                    .size(size)
                    .usage(usage)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE);

                buffer.buffer = unsafe { vk_device.create_buffer(&buffer_info, None) }
                    .map_err(|e| GraphicsError::from_allocation(e, "Failed to create buffer"))?;

                let requirements = unsafe { vk_device.get_buffer_memory_requirements(buffer.buffer) };
                let memory_type_index = find_memory_type(
                    device.memory_properties(),
                    requirements.memory_type_bits,
                    properties,
                )?;

                let allocate_info = vk::MemoryAllocateInfo::default()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                buffer.memory = unsafe { vk_device.allocate_memory(&allocate_info, None) }
                    .map_err(|e| GraphicsError::from_allocation(e, "Failed to allocate buffer memory"))?;

                unsafe { vk_device.bind_buffer_memory(buffer.buffer, buffer.memory, 0) }.map_err(
                    |e| GraphicsError::GenericVulkan(format!("Failed to bind buffer memory: {:?}", e)),
                )?;
            }
        }

        Ok(buffer)
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Map the whole buffer for host access. Mapping twice returns the
    /// existing mapping.
    pub fn map(&mut self) -> Result<&mut [u8], GraphicsError> {
        if !self
            .properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(GraphicsError::InvalidParameter(
                "cannot map a buffer without host-visible memory".to_string(),
            ));
        }

        if self.mapped.is_none() {
            let pointer = match self.device.backend() {
                DeviceBackend::Dummy(_) => self.host.as_mut_ptr(),
                DeviceBackend::Vulkan(context) => unsafe {
                    context.device().map_memory(
                        self.memory,
                        0,
                        vk::WHOLE_SIZE,
                        vk::MemoryMapFlags::empty(),
                    )
                }
                .map_err(|e| GraphicsError::GenericVulkan(format!("Failed to map memory: {:?}", e)))?
                .cast::<u8>(),
            };
            self.mapped = NonNull::new(pointer);
        }

        self.mapped_slice().ok_or_else(|| {
            GraphicsError::GenericVulkan("Mapping returned a null pointer".to_string())
        })
    }

    /// The current mapping, if the buffer is mapped.
    pub fn mapped_slice(&mut self) -> Option<&mut [u8]> {
        let pointer = self.mapped?;
        // SAFETY: the mapping covers `size` bytes and lives until `unmap`,
        // which needs `&mut self` just like this borrow.
        Some(unsafe { std::slice::from_raw_parts_mut(pointer.as_ptr(), self.size as usize) })
    }

    /// Copy `data` into the mapping at `offset`.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let size = self.size;
        let mapping = self.mapped_slice().ok_or_else(|| {
            GraphicsError::InvalidParameter("write to an unmapped buffer".to_string())
        })?;

        let end = offset
            .checked_add(data.len() as u64)
            .filter(|end| *end <= size)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "write of {} bytes at offset {} exceeds buffer size {}",
                    data.len(),
                    offset,
                    size
                ))
            })?;

        mapping[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            if let Some(device) = self.device.vk_device() {
                unsafe { device.unmap_memory(self.memory) };
            }
        }
    }

    /// Copy the whole buffer into `destination` and block until done.
    ///
    /// Meant for one-time uploads, never for the per-frame path.
    pub fn copy_to(&self, destination: &mut GpuBuffer) -> Result<(), GraphicsError> {
        if destination.size < self.size {
            return Err(GraphicsError::InvalidParameter(format!(
                "copy of {} bytes into a buffer of {} bytes",
                self.size, destination.size
            )));
        }

        match self.device.backend() {
            DeviceBackend::Dummy(_) => {
                let size = self.size as usize;
                destination.host[..size].copy_from_slice(&self.host[..size]);
                Ok(())
            }
            DeviceBackend::Vulkan(context) => {
                let region = vk::BufferCopy::default().size(self.size);
                let source = self.buffer;
                let target = destination.buffer;
                command::submit_one_time(
                    context.device(),
                    context.draw_queue(),
                    context.draw_queue_family_index(),
                    |device, command_buffer| unsafe {
                        device.cmd_copy_buffer(command_buffer, source, target, &[region]);
                    },
                )
            }
        }
    }

    /// Contents of a dummy buffer, for inspection in tests.
    pub fn dummy_contents(&self) -> Option<&[u8]> {
        match self.device.backend() {
            DeviceBackend::Dummy(_) => Some(&self.host),
            DeviceBackend::Vulkan(_) => None,
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.unmap();

        if let Some(device) = self.device.vk_device() {
            unsafe {
                if self.buffer != vk::Buffer::null() {
                    device.destroy_buffer(self.buffer, None);
                }
                if self.memory != vk::DeviceMemory::null() {
                    device.free_memory(self.memory, None);
                }
            }
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("properties", &self.properties)
            .field("mapped", &self.mapped.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    fn host_visible() -> vk::MemoryPropertyFlags {
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
    }

    #[test]
    fn mapped_writes_land_in_memory() {
        let device = Arc::new(GraphicsDevice::dummy());
        let mut buffer =
            GpuBuffer::new(&device, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible(), 16)
                .unwrap();

        buffer.map().unwrap();
        buffer.write(4, &[1, 2, 3]).unwrap();
        assert_eq!(&buffer.dummy_contents().unwrap()[..8], &[0, 0, 0, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn write_past_the_end_is_rejected() {
        let device = Arc::new(GraphicsDevice::dummy());
        let mut buffer =
            GpuBuffer::new(&device, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible(), 8)
                .unwrap();
        buffer.map().unwrap();

        assert!(buffer.write(6, &[0; 4]).is_err());
        assert!(buffer.write(u64::MAX, &[0]).is_err());
    }

    #[test]
    fn write_requires_mapping() {
        let device = Arc::new(GraphicsDevice::dummy());
        let mut buffer =
            GpuBuffer::new(&device, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible(), 8)
                .unwrap();

        assert!(buffer.write(0, &[1]).is_err());
        buffer.map().unwrap();
        buffer.unmap();
        assert!(!buffer.is_mapped());
        assert!(buffer.write(0, &[1]).is_err());
    }

    #[test]
    fn device_local_buffers_cannot_be_mapped() {
        let device = Arc::new(GraphicsDevice::dummy());
        let mut buffer = GpuBuffer::new(
            &device,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            8,
        )
        .unwrap();

        assert!(matches!(buffer.map(), Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn copy_to_transfers_whole_buffer() {
        let device = Arc::new(GraphicsDevice::dummy());
        let mut staging =
            GpuBuffer::new(&device, vk::BufferUsageFlags::TRANSFER_SRC, host_visible(), 4).unwrap();
        staging.map().unwrap().copy_from_slice(&[9, 8, 7, 6]);

        let mut target = GpuBuffer::new(
            &device,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            4,
        )
        .unwrap();
        staging.copy_to(&mut target).unwrap();

        assert_eq!(target.dummy_contents().unwrap(), &[9, 8, 7, 6]);
    }

    #[test]
    fn missing_memory_type_is_not_supported() {
        let device = Arc::new(GraphicsDevice::from_dummy(
            DummyDevice::new().with_memory_types(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]),
        ));
        let err = GpuBuffer::new(&device, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible(), 8)
            .unwrap_err();
        assert!(matches!(err, GraphicsError::FeatureNotSupported(_)));
    }

    #[test]
    fn zero_sized_buffer_is_invalid() {
        let device = Arc::new(GraphicsDevice::dummy());
        assert!(GpuBuffer::new(&device, vk::BufferUsageFlags::UNIFORM_BUFFER, host_visible(), 0)
            .is_err());
    }
}
