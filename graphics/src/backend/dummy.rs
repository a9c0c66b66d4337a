//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out unique
//! fake handles, keeps recorded commands per submission and models fences
//! as atomics that stay unsignaled until the fake GPU "completes" the work.
//! Work completes in submission order, through
//! [`DummyDevice::complete_next_submission`],
//! [`DummyDevice::complete_submissions`] or a wait on one of the fences.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk::{self, Handle};
use parking_lot::Mutex;

use super::{GpuFence, GpuSemaphore};

/// A command recorded against the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    },
    SetViewport {
        extent: vk::Extent2D,
    },
    BindMesh {
        buffer: vk::Buffer,
        index_offset: u64,
    },
    BindDescriptorSet {
        descriptor_set: vk::DescriptorSet,
        dynamic_offset: u32,
    },
    BindPipeline {
        pipeline: vk::Pipeline,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
    },
    EndRenderPass,
}

/// A queue submission captured by the dummy backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DummySubmission {
    pub command_buffer: vk::CommandBuffer,
    pub commands: Vec<DummyCommand>,
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub signal_semaphores: Vec<vk::Semaphore>,
}

#[derive(Debug, Default)]
struct DummyState {
    recording: Vec<DummyCommand>,
    submissions: Vec<DummySubmission>,
}

/// Fences of submitted work the fake GPU has not finished, oldest first.
#[derive(Debug, Default)]
pub struct DummyQueue {
    pending: VecDeque<Arc<AtomicBool>>,
}

impl DummyQueue {
    pub(crate) fn is_pending(&self, fence: &Arc<AtomicBool>) -> bool {
        self.pending.iter().any(|pending| Arc::ptr_eq(pending, fence))
    }

    /// Finish the oldest pending submission.
    pub(crate) fn complete_next(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(fence) => {
                fence.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Finish every submission up to and including the one signaling `fence`.
    ///
    /// Returns `false` when `fence` has no pending submission.
    pub(crate) fn complete_through(&mut self, fence: &Arc<AtomicBool>) -> bool {
        let Some(position) = self
            .pending
            .iter()
            .position(|pending| Arc::ptr_eq(pending, fence))
        else {
            return false;
        };
        for _ in 0..=position {
            self.complete_next();
        }
        true
    }

    pub(crate) fn complete_all(&mut self) {
        while self.complete_next() {}
    }
}

/// Dummy GPU device.
#[derive(Debug)]
pub struct DummyDevice {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    uniform_buffer_offset_alignment: u64,
    multisample_count: vk::SampleCountFlags,
    next_handle: AtomicU64,
    state: Mutex<DummyState>,
    queue: Arc<Mutex<DummyQueue>>,
}

impl DummyDevice {
    /// A device with device-local, host-visible and shared memory types,
    /// a 256-byte uniform offset alignment and 4x multisampling.
    pub fn new() -> Self {
        Self {
            memory_properties: memory_properties(&[
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                vk::MemoryPropertyFlags::DEVICE_LOCAL
                    | vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT,
            ]),
            uniform_buffer_offset_alignment: 256,
            multisample_count: vk::SampleCountFlags::TYPE_4,
            next_handle: AtomicU64::new(1),
            state: Mutex::new(DummyState::default()),
            queue: Arc::new(Mutex::new(DummyQueue::default())),
        }
    }

    /// Replace the reported memory types.
    pub fn with_memory_types(mut self, types: &[vk::MemoryPropertyFlags]) -> Self {
        self.memory_properties = memory_properties(types);
        self
    }

    pub fn with_uniform_alignment(mut self, alignment: u64) -> Self {
        self.uniform_buffer_offset_alignment = alignment;
        self
    }

    pub fn with_multisample_count(mut self, samples: vk::SampleCountFlags) -> Self {
        self.multisample_count = samples;
        self
    }

    pub fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        self.memory_properties
    }

    pub fn uniform_buffer_offset_alignment(&self) -> u64 {
        self.uniform_buffer_offset_alignment
    }

    pub fn multisample_count(&self) -> vk::SampleCountFlags {
        self.multisample_count
    }

    /// A fresh non-null handle of any Vulkan object type.
    pub fn next_handle<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn create_fence(&self, signaled: bool) -> GpuFence {
        log::trace!("DummyDevice: creating fence (signaled: {})", signaled);
        GpuFence::Dummy {
            signaled: Arc::new(AtomicBool::new(signaled)),
            queue: Arc::clone(&self.queue),
        }
    }

    /// Signal `fence` without any GPU work.
    pub(crate) fn signal_fence(&self, fence: &GpuFence) {
        if let GpuFence::Dummy { signaled, .. } = fence {
            signaled.store(true, Ordering::Release);
        }
    }

    pub(crate) fn create_semaphore(&self) -> GpuSemaphore {
        GpuSemaphore::Dummy {
            handle: self.next_handle(),
        }
    }

    pub(crate) fn record(&self, command: DummyCommand) {
        log::trace!("DummyDevice: {:?}", command);
        self.state.lock().recording.push(command);
    }

    /// Discard commands recorded since the last submission.
    pub(crate) fn reset_recording(&self) {
        self.state.lock().recording.clear();
    }

    pub(crate) fn submit(
        &self,
        command_buffer: vk::CommandBuffer,
        wait_semaphores: Vec<vk::Semaphore>,
        signal_semaphores: Vec<vk::Semaphore>,
        fence: &GpuFence,
    ) {
        let mut state = self.state.lock();
        let commands = std::mem::take(&mut state.recording);
        log::trace!(
            "DummyDevice: submitting {:?} with {} commands",
            command_buffer,
            commands.len()
        );

        if let GpuFence::Dummy { signaled, .. } = fence {
            signaled.store(false, Ordering::Release);
            self.queue.lock().pending.push_back(Arc::clone(signaled));
        }
        state.submissions.push(DummySubmission {
            command_buffer,
            commands,
            wait_semaphores,
            signal_semaphores,
        });
    }

    /// Finish the oldest pending submission and signal its fence.
    ///
    /// Returns `false` when nothing is pending.
    pub fn complete_next_submission(&self) -> bool {
        self.queue.lock().complete_next()
    }

    /// Signal every fence whose submission is still pending.
    pub fn complete_submissions(&self) {
        self.queue.lock().complete_all();
    }

    pub fn pending_submission_count(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// All submissions so far, oldest first.
    pub fn submissions(&self) -> Vec<DummySubmission> {
        self.state.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut properties = vk::PhysicalDeviceMemoryProperties {
        memory_heap_count: 1,
        ..Default::default()
    };
    properties.memory_heaps[0] = vk::MemoryHeap {
        size: 1 << 30,
        flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
    };

    let count = types.len().min(vk::MAX_MEMORY_TYPES);
    for (slot, flags) in properties.memory_types[..count].iter_mut().zip(types) {
        *slot = vk::MemoryType {
            property_flags: *flags,
            heap_index: 0,
        };
    }
    properties.memory_type_count = count as u32;
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_non_null() {
        let device = DummyDevice::new();
        let a: vk::Buffer = device.next_handle();
        let b: vk::Buffer = device.next_handle();
        assert_ne!(a, b);
        assert!(!a.is_null());
    }

    #[test]
    fn submission_keeps_fence_pending_until_completed() {
        let device = DummyDevice::new();
        let fence = device.create_fence(true);

        device.record(DummyCommand::EndRenderPass);
        device.submit(vk::CommandBuffer::null(), Vec::new(), Vec::new(), &fence);
        assert!(!fence.is_signaled());

        device.complete_submissions();
        assert!(fence.is_signaled());

        let submissions = device.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].commands, vec![DummyCommand::EndRenderPass]);
    }

    #[test]
    fn submissions_complete_in_order() {
        let device = DummyDevice::new();
        let first = device.create_fence(true);
        let second = device.create_fence(true);
        device.submit(vk::CommandBuffer::null(), Vec::new(), Vec::new(), &first);
        device.submit(vk::CommandBuffer::null(), Vec::new(), Vec::new(), &second);
        assert_eq!(device.pending_submission_count(), 2);

        assert!(device.complete_next_submission());
        assert!(first.is_signaled());
        assert!(!second.is_signaled());

        assert!(device.complete_next_submission());
        assert!(second.is_signaled());
        assert!(!device.complete_next_submission());
    }

    #[test]
    fn custom_memory_types() {
        let device = DummyDevice::new().with_memory_types(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let properties = device.memory_properties();
        assert_eq!(properties.memory_type_count, 1);
        assert_eq!(
            properties.memory_types[0].property_flags,
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
    }
}
