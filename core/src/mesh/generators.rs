//! Procedural shapes for scenes that do not load model files.
//!
//! Each generator appends its geometry to a [`MeshData`] and returns the
//! [`Model`] range to draw it.

use std::f32::consts::TAU;

use super::data::{MeshData, Model, Vertex};

const FACING: [f32; 3] = [0.0, 0.0, 1.0];

/// Append a single colored triangle in the z = 0.1 plane.
pub fn add_triangle(mesh: &mut MeshData) -> Model {
    let vertices = [
        Vertex::new([0.25, -0.5, 0.1], FACING, [1.0, 1.0, 1.0]),
        Vertex::new([0.5, 0.5, 0.1], FACING, [0.0, 1.0, 0.0]),
        Vertex::new([-0.5, 0.5, 0.1], FACING, [0.0, 0.0, 1.0]),
    ];
    mesh.push_model(&vertices, &[0, 1, 2])
}

/// Append a unit quad spanning [-1, 1] on X and Y.
pub fn add_quad(mesh: &mut MeshData) -> Model {
    let vertices = [
        Vertex::new([-1.0, -1.0, 0.0], FACING, [1.0, 0.0, 0.0]),
        Vertex::new([1.0, -1.0, 0.0], FACING, [0.0, 1.0, 0.0]),
        Vertex::new([-1.0, 1.0, 0.0], FACING, [0.0, 0.0, 1.0]),
        Vertex::new([1.0, 1.0, 0.0], FACING, [1.0, 1.0, 1.0]),
    ];
    mesh.push_model(&vertices, &[0, 1, 2, 2, 1, 3])
}

/// Append a filled ellipse as a triangle fan around its center.
///
/// `segments` is clamped to at least 3.
pub fn add_ellipse(mesh: &mut MeshData, segments: u32, width: f32, height: f32) -> Model {
    let segments = segments.max(3);
    let color = [0.8, 0.0, 0.0];

    let mut vertices = Vec::with_capacity(segments as usize + 1);
    vertices.push(Vertex::new([0.0, 0.0, 0.1], FACING, color));
    for segment in 0..segments {
        let angle = segment as f32 / segments as f32 * TAU;
        let x = width * 0.5 * angle.cos();
        let y = height * 0.5 * angle.sin();
        vertices.push(Vertex::new([x, y, 0.1], FACING, color));
    }

    let mut indices = Vec::with_capacity(segments as usize * 3);
    for segment in 0..segments {
        indices.push(0);
        indices.push(1 + segment);
        indices.push(1 + (segment + 1) % segments);
    }

    mesh.push_model(&vertices, &indices)
}
