//! Merged vertex/index data and the model ranges that index into it.

use std::mem::size_of;

/// Vertex with position, normal and color attributes (locations 0, 1, 2).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    /// Byte offsets of the position, normal and color attributes.
    pub const ATTRIBUTE_OFFSETS: [u32; 3] = [0, 12, 24];
}

/// Range of the shared index buffer drawn for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Model {
    pub first_index: u32,
    pub index_count: u32,
}

/// Vertex and index data of every model, flattened for a single upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Byte offset of the index block, equal to the size of the vertex block.
    pub fn index_offset(&self) -> usize {
        self.vertices.len() * size_of::<Vertex>()
    }

    /// Total size in bytes of the vertex block plus the index block.
    pub fn size(&self) -> usize {
        self.index_offset() + self.indices.len() * size_of::<u32>()
    }

    /// Copy the vertex block followed by the index block into `destination`.
    ///
    /// # Panics
    ///
    /// Panics if `destination` is shorter than [`size`](Self::size).
    pub fn write_to(&self, destination: &mut [u8]) {
        let index_offset = self.index_offset();
        let size = self.size();
        destination[..index_offset].copy_from_slice(bytemuck::cast_slice(&self.vertices));
        destination[index_offset..size].copy_from_slice(bytemuck::cast_slice(&self.indices));
    }

    /// Owned copy of the merged buffer contents.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size()];
        self.write_to(&mut bytes);
        bytes
    }

    /// Append a model. `indices` are relative to `vertices` and are rebased
    /// onto the shared vertex block.
    pub fn push_model(&mut self, vertices: &[Vertex], indices: &[u32]) -> Model {
        let base_vertex = self.vertices.len() as u32;
        let first_index = self.indices.len() as u32;

        self.vertices.extend_from_slice(vertices);
        self.indices
            .extend(indices.iter().map(|index| base_vertex + index));

        let model = Model {
            first_index,
            index_count: indices.len() as u32,
        };
        log::debug!(
            "Mesh data: model {:?} ({} vertices, {} indices)",
            model,
            vertices.len(),
            indices.len()
        );
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> [Vertex; 3] {
        [
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 36);
        assert_eq!(Vertex::ATTRIBUTE_OFFSETS, [0, 12, 24]);
    }

    #[test]
    fn sizes_and_offsets() {
        let mut mesh = MeshData::new();
        mesh.push_model(&triangle(), &[0, 1, 2]);

        assert_eq!(mesh.index_offset(), 3 * 36);
        assert_eq!(mesh.size(), 3 * 36 + 3 * 4);
    }

    #[test]
    fn second_model_indices_are_rebased() {
        let mut mesh = MeshData::new();
        let first = mesh.push_model(&triangle(), &[0, 1, 2]);
        let second = mesh.push_model(&triangle(), &[2, 1, 0]);

        assert_eq!(first, Model { first_index: 0, index_count: 3 });
        assert_eq!(second, Model { first_index: 3, index_count: 3 });
        assert_eq!(mesh.indices(), &[0, 1, 2, 5, 4, 3]);
    }

    #[test]
    fn write_to_places_indices_after_vertices() {
        let mut mesh = MeshData::new();
        mesh.push_model(&triangle(), &[0, 1, 2]);

        let bytes = mesh.to_bytes();
        let offset = mesh.index_offset();
        let indices: Vec<u32> = bytes[offset..]
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let triangle = triangle();
        let expected: &[u8] = bytemuck::cast_slice(&triangle);
        assert_eq!(&bytes[..offset], expected);
    }

    #[test]
    #[should_panic]
    fn write_to_rejects_short_destination() {
        let mut mesh = MeshData::new();
        mesh.push_model(&triangle(), &[0, 1, 2]);
        let mut bytes = vec![0u8; mesh.size() - 1];
        mesh.write_to(&mut bytes);
    }
}
