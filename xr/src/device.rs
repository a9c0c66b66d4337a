//! XR-driven device bootstrap.
//!
//! With OpenXR the runtime decides which GPU drives the headset and which
//! Vulkan extensions that GPU needs, so the Vulkan instance and device are
//! created here rather than in the graphics crate.

use std::sync::Arc;

use ::openxr as xr;
use ash::vk::{self, Handle};
use vireo_graphics::backend::vulkan::{device, instance, VulkanContext};
use vireo_graphics::{GraphicsDevice, GraphicsError};

use crate::runtime::openxr::{xr_error, BLEND_MODE, VIEW_CONFIGURATION};
use crate::runtime::{DummyRuntime, OpenXrRuntime, XrRuntime};

/// Reference space the eyes are located in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceSpace {
    /// Head-relative space at the user's starting position.
    Local,
    /// Room-scale space with the origin on the floor.
    #[default]
    Stage,
}

impl ReferenceSpace {
    fn to_xr(self) -> xr::ReferenceSpaceType {
        match self {
            Self::Local => xr::ReferenceSpaceType::LOCAL,
            Self::Stage => xr::ReferenceSpaceType::STAGE,
        }
    }
}

/// Options for [`XrDevice::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrDeviceConfig {
    pub application_name: String,
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    pub reference_space: ReferenceSpace,
}

impl Default for XrDeviceConfig {
    fn default() -> Self {
        Self {
            application_name: "Vireo".to_string(),
            validation: cfg!(debug_assertions),
            reference_space: ReferenceSpace::default(),
        }
    }
}

/// The graphics device and the XR runtime bound to it.
#[derive(Debug)]
pub struct XrDevice {
    pub graphics: Arc<GraphicsDevice>,
    pub runtime: XrRuntime,
}

impl XrDevice {
    /// Bootstrap OpenXR and a Vulkan device on the GPU it asks for.
    pub fn new(config: &XrDeviceConfig) -> Result<Self, GraphicsError> {
        let entry = unsafe { xr::Entry::load() }
            .map_err(|e| GraphicsError::GenericOpenXr(format!("Failed to load OpenXR: {}", e)))?;

        let available = entry
            .enumerate_extensions()
            .map_err(xr_error("Failed to enumerate OpenXR extensions"))?;
        if !available.khr_vulkan_enable {
            return Err(GraphicsError::FeatureNotSupported(
                "XR_KHR_vulkan_enable".to_string(),
            ));
        }

        let mut extensions = xr::ExtensionSet::default();
        extensions.khr_vulkan_enable = true;

        let xr_instance = entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name: &config.application_name,
                    application_version: 1,
                    engine_name: "Vireo",
                    engine_version: 1,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &extensions,
                &[],
            )
            .map_err(xr_error("Failed to create OpenXR instance"))?;

        if let Ok(properties) = xr_instance.properties() {
            log::info!(
                "OpenXR runtime: {} {}",
                properties.runtime_name,
                properties.runtime_version
            );
        }

        let system = xr_instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(|_| GraphicsError::HeadsetNotConnected)?;

        let blend_modes = xr_instance
            .enumerate_environment_blend_modes(system, VIEW_CONFIGURATION)
            .map_err(xr_error("Failed to enumerate blend modes"))?;
        if !blend_modes.contains(&BLEND_MODE) {
            return Err(GraphicsError::FeatureNotSupported(
                "opaque environment blend mode".to_string(),
            ));
        }

        let requirements = xr_instance
            .graphics_requirements::<xr::Vulkan>(system)
            .map_err(xr_error("Failed to get Vulkan graphics requirements"))?;
        let minimum = requirements.min_api_version_supported;
        let api_version = vk::make_api_version(
            0,
            u32::from(minimum.major()),
            u32::from(minimum.minor()),
            0,
        );

        let instance_extensions = instance::parse_extension_list(
            &xr_instance
                .vulkan_legacy_instance_extensions(system)
                .map_err(xr_error("Failed to get Vulkan instance extensions"))?,
        )?;
        let device_extensions = instance::parse_extension_list(
            &xr_instance
                .vulkan_legacy_device_extensions(system)
                .map_err(xr_error("Failed to get Vulkan device extensions"))?,
        )?;

        let vk_entry = instance::load_entry()?;
        let (vk_instance, debug_messenger) = instance::create_instance(
            &vk_entry,
            &config.application_name,
            api_version,
            &instance_extensions,
            config.validation,
        )?;

        let created = unsafe {
            xr_instance.vulkan_graphics_device(system, vk_instance.handle().as_raw() as _)
        }
        .map_err(xr_error("Failed to get Vulkan graphics device"))
        .map(|physical_device| vk::PhysicalDevice::from_raw(physical_device as u64))
        .and_then(|physical_device| {
            device::log_physical_device(&vk_instance, physical_device);
            let family = device::find_draw_queue_family(&vk_instance, physical_device)?;
            let vk_device = device::create_logical_device(
                &vk_instance,
                physical_device,
                family,
                &device_extensions,
            )?;
            Ok((physical_device, vk_device, family))
        });

        let (physical_device, vk_device, family) = match created {
            Ok(created) => created,
            Err(e) => {
                unsafe {
                    if let Some(messenger) = debug_messenger {
                        messenger.destroy();
                    }
                    vk_instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let context = VulkanContext::new(
            vk_entry,
            vk_instance,
            debug_messenger,
            physical_device,
            vk_device,
            family,
        );
        let graphics = Arc::new(GraphicsDevice::from_vulkan(context));

        let runtime = OpenXrRuntime::new(
            xr_instance,
            system,
            &graphics,
            config.reference_space.to_xr(),
        )?;

        Ok(Self {
            graphics,
            runtime: XrRuntime::OpenXr(runtime),
        })
    }

    /// A Dummy graphics device paired with a scripted runtime.
    pub fn dummy(graphics: GraphicsDevice, runtime: DummyRuntime) -> Self {
        Self {
            graphics: Arc::new(graphics),
            runtime: XrRuntime::Dummy(runtime),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_stage_space() {
        let config = XrDeviceConfig::default();
        assert_eq!(config.reference_space, ReferenceSpace::Stage);
        assert_eq!(config.reference_space.to_xr(), xr::ReferenceSpaceType::STAGE);
    }

    #[test]
    fn dummy_device_pairs_backends() {
        let device = XrDevice::dummy(GraphicsDevice::dummy(), DummyRuntime::new());
        assert_eq!(device.graphics.backend_name(), "Dummy");
        assert_eq!(device.runtime.name(), "Dummy");
    }
}
