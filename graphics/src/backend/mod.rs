//! GPU backend layer.
//!
//! Two backends sit behind [`GraphicsDevice`](crate::GraphicsDevice):
//!
//! - `vulkan`: native Vulkan through ash, bootstrapped by the XR runtime
//! - `dummy`: no GPU at all; fences are atomics, mapped memory is a host
//!   `Vec<u8>` and recorded commands are kept for inspection by tests
//!
//! Resource owners hold raw `vk` handles for both backends. Dummy handles
//! are unique non-null values that are never handed to a driver.

pub mod dummy;
pub mod recorder;
pub mod vulkan;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::error::GraphicsError;

use dummy::DummyQueue;

pub use dummy::{DummyCommand, DummyDevice, DummySubmission};
pub use recorder::CommandRecorder;

/// Handle to a fence for CPU-GPU synchronization.
pub enum GpuFence {
    /// Dummy backend fence, signaled when the fake GPU completes the submission.
    Dummy {
        signaled: Arc<AtomicBool>,
        queue: Arc<Mutex<DummyQueue>>,
    },
    /// Vulkan backend fence.
    Vulkan { device: ash::Device, fence: vk::Fence },
}

impl std::fmt::Debug for GpuFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { signaled, .. } => f
                .debug_struct("GpuFence::Dummy")
                .field("signaled", &signaled.load(Ordering::Acquire))
                .finish(),
            Self::Vulkan { fence, .. } => f
                .debug_struct("GpuFence::Vulkan")
                .field("fence", fence)
                .finish_non_exhaustive(),
        }
    }
}

impl GpuFence {
    /// Raw handle for queue submission. Null for the dummy backend.
    pub fn handle(&self) -> vk::Fence {
        match self {
            Self::Dummy { .. } => vk::Fence::null(),
            Self::Vulkan { fence, .. } => *fence,
        }
    }

    /// Check if the fence is signaled (non-blocking).
    pub fn is_signaled(&self) -> bool {
        match self {
            Self::Dummy { signaled, .. } => signaled.load(Ordering::Acquire),
            Self::Vulkan { device, fence } => {
                matches!(unsafe { device.get_fence_status(*fence) }, Ok(true))
            }
        }
    }

    /// Block until the fence is signaled or `timeout_ns` elapses.
    ///
    /// Returns `false` on timeout. Waiting on a dummy fence completes its
    /// submission and every older one. An unsignaled dummy fence with no
    /// pending submission is an error, since a real wait would never return.
    pub fn wait(&self, timeout_ns: u64) -> Result<bool, GraphicsError> {
        match self {
            Self::Dummy { signaled, queue } => {
                if signaled.load(Ordering::Acquire) || queue.lock().complete_through(signaled) {
                    return Ok(true);
                }
                Err(GraphicsError::InvalidParameter(
                    "waiting on an unsignaled fence with no pending submission".to_string(),
                ))
            }
            Self::Vulkan { device, fence } => {
                match unsafe { device.wait_for_fences(&[*fence], true, timeout_ns) } {
                    Ok(()) => Ok(true),
                    Err(vk::Result::TIMEOUT) => Ok(false),
                    Err(e) => Err(GraphicsError::GenericVulkan(format!(
                        "Fence wait failed: {:?}",
                        e
                    ))),
                }
            }
        }
    }

    /// Return the fence to the unsignaled state.
    ///
    /// The dummy backend refuses to reset a fence whose work is still
    /// pending, which Vulkan leaves undefined.
    pub fn reset(&self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy { signaled, queue } => {
                if queue.lock().is_pending(signaled) {
                    return Err(GraphicsError::InvalidParameter(
                        "fence reset while its submission is still pending".to_string(),
                    ));
                }
                signaled.store(false, Ordering::Release);
                Ok(())
            }
            Self::Vulkan { device, fence } => unsafe { device.reset_fences(&[*fence]) }
                .map_err(|e| GraphicsError::GenericVulkan(format!("Fence reset failed: {:?}", e))),
        }
    }
}

impl Drop for GpuFence {
    fn drop(&mut self) {
        if let Self::Vulkan { device, fence } = self {
            unsafe { device.destroy_fence(*fence, None) };
        }
    }
}

/// Handle to a GPU semaphore for GPU-GPU synchronization.
pub enum GpuSemaphore {
    /// Dummy backend semaphore.
    Dummy { handle: vk::Semaphore },
    /// Vulkan backend semaphore.
    Vulkan {
        device: ash::Device,
        semaphore: vk::Semaphore,
    },
}

impl std::fmt::Debug for GpuSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { handle } => f
                .debug_struct("GpuSemaphore::Dummy")
                .field("handle", handle)
                .finish(),
            Self::Vulkan { semaphore, .. } => f
                .debug_struct("GpuSemaphore::Vulkan")
                .field("semaphore", semaphore)
                .finish_non_exhaustive(),
        }
    }
}

impl GpuSemaphore {
    pub fn handle(&self) -> vk::Semaphore {
        match self {
            Self::Dummy { handle } => *handle,
            Self::Vulkan { semaphore, .. } => *semaphore,
        }
    }
}

impl Drop for GpuSemaphore {
    fn drop(&mut self) {
        if let Self::Vulkan { device, semaphore } = self {
            unsafe { device.destroy_semaphore(*semaphore, None) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(device: &DummyDevice, fence: &GpuFence) {
        device.submit(vk::CommandBuffer::null(), Vec::new(), Vec::new(), fence);
    }

    #[test]
    fn dummy_fence_reset_refuses_pending_work() {
        let device = DummyDevice::new();
        let fence = device.create_fence(true);
        assert!(fence.reset().is_ok());
        assert!(!fence.is_signaled());

        submit(&device, &fence);
        let err = fence.reset().unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidParameter(_)));
    }

    #[test]
    fn dummy_fence_wait_completes_work() {
        let device = DummyDevice::new();
        let fence = device.create_fence(true);
        fence.reset().unwrap();
        submit(&device, &fence);

        assert!(fence.wait(u64::MAX).unwrap());
        assert!(fence.is_signaled());
        assert_eq!(device.pending_submission_count(), 0);
        assert!(fence.reset().is_ok());
    }

    #[test]
    fn dummy_fence_wait_completes_older_work_only() {
        let device = DummyDevice::new();
        let first = device.create_fence(true);
        let second = device.create_fence(true);
        let third = device.create_fence(true);
        for fence in [&first, &second, &third] {
            submit(&device, fence);
        }

        assert!(second.wait(u64::MAX).unwrap());
        assert!(first.is_signaled());
        assert!(!third.is_signaled());
        assert_eq!(device.pending_submission_count(), 1);
    }

    #[test]
    fn dummy_fence_wait_without_work_fails() {
        let device = DummyDevice::new();
        let fence = device.create_fence(false);
        let err = fence.wait(u64::MAX).unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidParameter(_)));
        assert!(!fence.is_signaled());
    }

    #[test]
    fn dummy_handles_are_null_for_submission() {
        let device = DummyDevice::new();
        assert_eq!(device.create_fence(true).handle(), vk::Fence::null());
    }
}
