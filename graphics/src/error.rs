//! Graphics error types.

use std::fmt;

use ash::vk;

/// Errors that can occur in the graphics and XR layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A required capability, extension, memory type or format is absent.
    FeatureNotSupported(String),
    /// A shader or asset file could not be read or is not valid.
    FileMissing(String),
    /// An unexpected Vulkan call failure.
    GenericVulkan(String),
    /// An unexpected OpenXR call failure.
    GenericOpenXr(String),
    /// A device or host allocation failed.
    OutOfMemory(String),
    /// No head-mounted display is connected to the XR runtime.
    HeadsetNotConnected,
    /// No usable Vulkan loader or driver.
    VulkanNotSupported(String),
    /// A desktop window could not be created or presented to.
    WindowFailure(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
}

impl GraphicsError {
    /// Map a Vulkan allocation result, keeping out-of-memory distinct.
    pub fn from_allocation(result: vk::Result, what: &str) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
                Self::OutOfMemory(format!("{what}: {result:?}"))
            }
            other => Self::GenericVulkan(format!("{what}: {other:?}")),
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::FileMissing(msg) => write!(f, "file missing: {msg}"),
            Self::GenericVulkan(msg) => write!(f, "Vulkan error: {msg}"),
            Self::GenericOpenXr(msg) => write!(f, "OpenXR error: {msg}"),
            Self::OutOfMemory(msg) => write!(f, "out of memory: {msg}"),
            Self::HeadsetNotConnected => write!(f, "no headset connected"),
            Self::VulkanNotSupported(msg) => write!(f, "Vulkan not supported: {msg}"),
            Self::WindowFailure(msg) => write!(f, "window failure: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::HeadsetNotConnected;
        assert_eq!(err.to_string(), "no headset connected");

        let err = GraphicsError::FileMissing("shaders/Diffuse.vert.spv".to_string());
        assert_eq!(err.to_string(), "file missing: shaders/Diffuse.vert.spv");
    }

    #[test]
    fn test_allocation_mapping() {
        let err = GraphicsError::from_allocation(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "buffer");
        assert!(matches!(err, GraphicsError::OutOfMemory(_)));

        let err = GraphicsError::from_allocation(vk::Result::ERROR_DEVICE_LOST, "buffer");
        assert!(matches!(err, GraphicsError::GenericVulkan(_)));
    }
}
