//! Native Vulkan backend using ash.
//!
//! The XR runtime decides which physical device to use and which instance
//! and device extensions to enable, so the context is assembled from parts
//! by the XR bootstrap rather than created here on its own.

pub mod command;
pub mod debug;
pub mod device;
pub mod instance;

use std::ffi::CStr;

use ash::vk;

pub use debug::DebugMessenger;

/// Vulkan entry, instance, logical device and draw queue.
pub struct VulkanContext {
    /// Vulkan entry points (function loader).
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    draw_queue: vk::Queue,
    draw_queue_family_index: u32,
}

impl std::fmt::Debug for VulkanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanContext")
            .field("physical_device", &self.physical_device)
            .field("draw_queue_family_index", &self.draw_queue_family_index)
            .field("validation", &self.debug_messenger.is_some())
            .finish_non_exhaustive()
    }
}

impl VulkanContext {
    /// Take ownership of an already created instance and device.
    ///
    /// The draw queue is queue 0 of `draw_queue_family_index`.
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        debug_messenger: Option<DebugMessenger>,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        draw_queue_family_index: u32,
    ) -> Self {
        let draw_queue = unsafe { device.get_device_queue(draw_queue_family_index, 0) };

        Self {
            entry,
            instance,
            debug_messenger,
            physical_device,
            device,
            draw_queue,
            draw_queue_family_index,
        }
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn draw_queue(&self) -> vk::Queue {
        self.draw_queue
    }

    pub fn draw_queue_family_index(&self) -> u32 {
        self.draw_queue_family_index
    }

    pub fn physical_device_properties(&self) -> vk::PhysicalDeviceProperties {
        unsafe {
            self.instance
                .get_physical_device_properties(self.physical_device)
        }
    }

    pub fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        }
    }

    /// Human readable GPU name.
    pub fn device_name(&self) -> String {
        let properties = self.physical_device_properties();
        unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);

            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }

            self.instance.destroy_instance(None);
        }
    }
}
