//! Common utilities for renderer integration tests.
//!
//! Everything here runs on the Dummy backend: no GPU, no headset.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ash::vk::{self, Handle};
use glam::{Mat4, Vec3};
use vireo_core::mesh::generators;
use vireo_core::{GameObject, MeshData};
use vireo_graphics::{DummyDevice, GraphicsDevice, Material, StereoTarget};

/// A SPIR-V module header: magic, version 1.0, generator, bound, schema.
const SPIRV_HEADER: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];

/// A temporary directory of placeholder SPIR-V files, removed on drop.
pub struct ShaderDir {
    path: PathBuf,
}

impl ShaderDir {
    pub fn new(names: &[&str]) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "vireo-graphics-tests-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).expect("Failed to create shader dir");

        let bytes: Vec<u8> = SPIRV_HEADER.iter().flat_map(|w| w.to_le_bytes()).collect();
        for name in names {
            std::fs::write(path.join(name), &bytes).expect("Failed to write shader");
        }
        Self { path }
    }

    /// Directory with the default diffuse shader pair.
    pub fn diffuse() -> Self {
        Self::new(&[Material::DEFAULT_VERTEX_SHADER, Material::DEFAULT_FRAGMENT_SHADER])
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ShaderDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// A stereo target with fixed eyes and framebuffers.
pub struct FakeStereoTarget {
    pub resolution: vk::Extent2D,
    /// Overrides `resolution` for the second eye.
    pub right_resolution: Option<vk::Extent2D>,
    pub views: [Mat4; 2],
    pub projections: [Mat4; 2],
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl FakeStereoTarget {
    pub fn new(swapchain_images: usize) -> Self {
        Self {
            resolution: vk::Extent2D {
                width: 1832,
                height: 1920,
            },
            right_resolution: None,
            views: [
                Mat4::from_translation(Vec3::new(0.032, 0.0, 0.0)),
                Mat4::from_translation(Vec3::new(-0.032, 0.0, 0.0)),
            ],
            projections: [Mat4::perspective_rh(1.5, 0.95, 0.01, 250.0); 2],
            render_pass: vk::RenderPass::from_raw(0x5000),
            framebuffers: (0..swapchain_images)
                .map(|i| vk::Framebuffer::from_raw(0x6000 + i as u64))
                .collect(),
        }
    }
}

impl StereoTarget for FakeStereoTarget {
    fn eye_count(&self) -> usize {
        2
    }

    fn eye_resolution(&self, eye: usize) -> vk::Extent2D {
        match (eye, self.right_resolution) {
            (1, Some(resolution)) => resolution,
            _ => self.resolution,
        }
    }

    fn eye_view_matrix(&self, eye: usize) -> Mat4 {
        self.views[eye]
    }

    fn eye_projection_matrix(&self, eye: usize) -> Mat4 {
        self.projections[eye]
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, swapchain_image_index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(swapchain_image_index).copied()
    }
}

pub fn dummy_device() -> Arc<GraphicsDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(GraphicsDevice::from_dummy(DummyDevice::new()))
}

/// A triangle and a quad sharing one mesh, one object each.
pub fn two_object_scene() -> (MeshData, Vec<GameObject>) {
    let mut mesh = MeshData::new();
    let triangle = generators::add_triangle(&mut mesh);
    let quad = generators::add_quad(&mut mesh);

    let objects = vec![
        GameObject::new("triangle", triangle, 0)
            .with_world_matrix(Mat4::from_translation(Vec3::new(0.0, 1.0, -2.0))),
        GameObject::new("quad", quad, 1)
            .with_world_matrix(Mat4::from_translation(Vec3::new(1.0, 0.0, -3.0))),
    ];
    (mesh, objects)
}
