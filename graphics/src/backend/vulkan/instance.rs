//! Vulkan instance creation and configuration.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::GraphicsError;

use super::debug::DebugMessenger;

/// Lowest API version with core multiview support.
pub const MINIMUM_API_VERSION: u32 = vk::make_api_version(0, 1, 1, 0);

/// Validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Load the Vulkan library.
pub fn load_entry() -> Result<ash::Entry, GraphicsError> {
    unsafe { ash::Entry::load() }
        .map_err(|e| GraphicsError::VulkanNotSupported(format!("Failed to load Vulkan: {}", e)))
}

/// Create a Vulkan instance with the given extensions and optional validation.
///
/// `api_version` is raised to [`MINIMUM_API_VERSION`] when lower. Returns
/// the instance and, when validation is active, its debug messenger.
pub fn create_instance(
    entry: &ash::Entry,
    application_name: &str,
    api_version: u32,
    extensions: &[CString],
    validation_enabled: bool,
) -> Result<(ash::Instance, Option<DebugMessenger>), GraphicsError> {
    let validation_available = validation_enabled && check_validation_layer_support(entry);

    if validation_enabled && !validation_available {
        log::warn!("Validation layers requested but not available");
    }

    let app_name = CString::new(application_name)
        .map_err(|e| GraphicsError::InvalidParameter(format!("Application name: {}", e)))?;
    let engine_name = c"Vireo";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(api_version.max(MINIMUM_API_VERSION));

    let mut extension_names: Vec<*const std::ffi::c_char> =
        extensions.iter().map(|name| name.as_ptr()).collect();
    if validation_available {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layer_names: Vec<*const std::ffi::c_char> = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| match e {
        vk::Result::ERROR_EXTENSION_NOT_PRESENT | vk::Result::ERROR_LAYER_NOT_PRESENT => {
            GraphicsError::FeatureNotSupported(format!("Vulkan instance: {:?}", e))
        }
        vk::Result::ERROR_INCOMPATIBLE_DRIVER => {
            GraphicsError::VulkanNotSupported(format!("Vulkan instance: {:?}", e))
        }
        other => GraphicsError::from_allocation(other, "Failed to create Vulkan instance"),
    })?;

    let debug_messenger = if validation_available {
        match DebugMessenger::new(entry, &instance) {
            Ok(messenger) => Some(messenger),
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        }
    } else {
        None
    };

    log::info!(
        "Vulkan instance created ({} extensions, validation: {})",
        extension_names.len(),
        validation_available
    );

    Ok((instance, debug_messenger))
}

/// Split a space separated extension list into C strings.
pub fn parse_extension_list(list: &str) -> Result<Vec<CString>, GraphicsError> {
    list.split_whitespace()
        .map(|name| {
            CString::new(name)
                .map_err(|e| GraphicsError::InvalidParameter(format!("Extension name: {}", e)))
        })
        .collect()
}

/// Check if the validation layer is available.
fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let available_layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(_) => return false,
    };

    available_layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_list_is_split_on_whitespace() {
        let names =
            parse_extension_list("VK_KHR_external_memory_capabilities  VK_KHR_get_physical_device_properties2")
                .unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].to_str().unwrap(), "VK_KHR_external_memory_capabilities");
    }

    #[test]
    fn empty_extension_list() {
        assert!(parse_extension_list("").unwrap().is_empty());
    }
}
