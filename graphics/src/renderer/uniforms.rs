//! Uniform blocks and their placement in a frame's uniform buffer.
//!
//! ```text
//! | object 0 | pad | object 1 | pad | ... | object M-1 | pad | eyes | pad | frame |
//! ^ 0                                    ^ static_vertex_offset  ^ static_fragment_offset
//! ```

use std::mem::size_of;

use glam::{Mat4, Vec3, Vec4};
use static_assertions::const_assert_eq;

use crate::resources::align_up;

/// Per-object block, bound with a dynamic offset (binding 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DynamicUniformData {
    pub world_matrix: Mat4,
    pub color_multiplier: Vec4,
}

impl Default for DynamicUniformData {
    fn default() -> Self {
        Self {
            world_matrix: Mat4::IDENTITY,
            color_multiplier: Vec4::ONE,
        }
    }
}

/// Per-eye block for the vertex stage (binding 1).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StaticVertexUniformData {
    pub view_projection: [Mat4; 2],
}

impl Default for StaticVertexUniformData {
    fn default() -> Self {
        Self {
            view_projection: [Mat4::IDENTITY; 2],
        }
    }
}

/// Per-frame block for the fragment stage (binding 2).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StaticFragmentUniformData {
    /// Direction the light travels, `w` unused.
    pub light_direction: Vec4,
    pub time: f32,
    pub _padding: [f32; 3],
}

impl StaticFragmentUniformData {
    pub fn new(time: f32, light_direction: Vec3) -> Self {
        Self {
            light_direction: light_direction.extend(0.0),
            time,
            _padding: [0.0; 3],
        }
    }
}

const_assert_eq!(size_of::<DynamicUniformData>(), 80);
const_assert_eq!(size_of::<StaticVertexUniformData>(), 128);
const_assert_eq!(size_of::<StaticFragmentUniformData>(), 32);

/// Byte layout of one frame's uniform buffer for `object_count` objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLayout {
    pub alignment: u64,
    pub object_count: usize,
    /// Distance between two objects' dynamic blocks.
    pub dynamic_stride: u64,
    pub static_vertex_offset: u64,
    pub static_fragment_offset: u64,
    /// Total buffer size.
    pub size: u64,
}

impl UniformLayout {
    pub fn new(object_count: usize, alignment: u64) -> Self {
        let dynamic_stride = align_up(size_of::<DynamicUniformData>() as u64, alignment);
        let static_vertex_offset = dynamic_stride * object_count as u64;
        let static_fragment_offset =
            static_vertex_offset + align_up(size_of::<StaticVertexUniformData>() as u64, alignment);
        let size = static_fragment_offset + size_of::<StaticFragmentUniformData>() as u64;

        Self {
            alignment,
            object_count,
            dynamic_stride,
            static_vertex_offset,
            static_fragment_offset,
            size,
        }
    }

    /// Dynamic offset for the object at `index`.
    pub fn dynamic_offset(&self, index: usize) -> u32 {
        (self.dynamic_stride * index as u64) as u32
    }

    /// Size of the per-object region.
    pub fn dynamic_region_size(&self) -> u64 {
        self.static_vertex_offset
    }

    /// Serialize the three regions at their offsets.
    ///
    /// `dynamic` may hold fewer blocks than `object_count`; the remaining
    /// slots are left untouched.
    pub fn write(
        &self,
        destination: &mut [u8],
        dynamic: &[DynamicUniformData],
        static_vertex: &StaticVertexUniformData,
        static_fragment: &StaticFragmentUniformData,
    ) {
        let block = size_of::<DynamicUniformData>();
        for (index, data) in dynamic.iter().take(self.object_count).enumerate() {
            let offset = self.dynamic_offset(index) as usize;
            destination[offset..offset + block].copy_from_slice(bytemuck::bytes_of(data));
        }

        let offset = self.static_vertex_offset as usize;
        destination[offset..offset + size_of::<StaticVertexUniformData>()]
            .copy_from_slice(bytemuck::bytes_of(static_vertex));

        let offset = self.static_fragment_offset as usize;
        destination[offset..offset + size_of::<StaticFragmentUniformData>()]
            .copy_from_slice(bytemuck::bytes_of(static_fragment));
    }
}
