//! Vulkan physical and logical device management.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::GraphicsError;

/// Find the first queue family that supports graphics operations.
pub fn find_draw_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32, GraphicsError> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    queue_families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or_else(|| GraphicsError::FeatureNotSupported("graphics queue family".to_string()))
}

/// Pick the largest of 4, 2 or 1 samples supported for both color and depth
/// framebuffer attachments.
pub fn select_multisample_count(limits: &vk::PhysicalDeviceLimits) -> vk::SampleCountFlags {
    let supported = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;

    [vk::SampleCountFlags::TYPE_4, vk::SampleCountFlags::TYPE_2]
        .into_iter()
        .find(|count| supported.contains(*count))
        .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Log the name and type of the GPU chosen by the XR runtime.
pub fn log_physical_device(instance: &ash::Instance, physical_device: vk::PhysicalDevice) {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
    log::info!(
        "Using GPU: {:?} (type: {:?}, API {}.{}.{})",
        device_name,
        properties.device_type,
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    );
}

/// Create a logical device with one draw queue and multiview enabled.
///
/// Multiview is required. Multisampled storage images are enabled when the
/// device offers them.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    draw_queue_family_index: u32,
    extensions: &[CString],
) -> Result<ash::Device, GraphicsError> {
    let mut multiview_support = vk::PhysicalDeviceMultiviewFeatures::default();
    let supported_features = {
        let mut features2 =
            vk::PhysicalDeviceFeatures2::default().push_next(&mut multiview_support);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        features2.features
    };

    if multiview_support.multiview == vk::FALSE {
        return Err(GraphicsError::FeatureNotSupported("multiview".to_string()));
    }

    let storage_multisample = supported_features.shader_storage_image_multisample == vk::TRUE;
    if !storage_multisample {
        log::warn!("shaderStorageImageMultisample not supported");
    }

    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(draw_queue_family_index)
        .queue_priorities(&queue_priorities)];

    let extension_names: Vec<*const std::ffi::c_char> =
        extensions.iter().map(|name| name.as_ptr()).collect();

    let features =
        vk::PhysicalDeviceFeatures::default().shader_storage_image_multisample(storage_multisample);
    let mut multiview = vk::PhysicalDeviceMultiviewFeatures::default().multiview(true);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features)
        .push_next(&mut multiview);

    unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| match e {
        vk::Result::ERROR_EXTENSION_NOT_PRESENT | vk::Result::ERROR_FEATURE_NOT_PRESENT => {
            GraphicsError::FeatureNotSupported(format!("Vulkan device: {:?}", e))
        }
        other => GraphicsError::from_allocation(other, "Failed to create logical device"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn limits(color: vk::SampleCountFlags, depth: vk::SampleCountFlags) -> vk::PhysicalDeviceLimits {
        vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: color,
            framebuffer_depth_sample_counts: depth,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_4 | vk::SampleCountFlags::TYPE_8, vk::SampleCountFlags::TYPE_4)]
    #[case(vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2, vk::SampleCountFlags::TYPE_2)]
    #[case(vk::SampleCountFlags::TYPE_1, vk::SampleCountFlags::TYPE_1)]
    fn multisample_count_prefers_four(
        #[case] supported: vk::SampleCountFlags,
        #[case] expected: vk::SampleCountFlags,
    ) {
        assert_eq!(select_multisample_count(&limits(supported, supported)), expected);
    }

    #[test]
    fn multisample_count_needs_both_color_and_depth() {
        let color = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4;
        let depth = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2;
        assert_eq!(
            select_multisample_count(&limits(color, depth)),
            vk::SampleCountFlags::TYPE_1
        );
    }
}
