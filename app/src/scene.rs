//! The demo scene.

use std::f32::consts::FRAC_PI_2;

use ash::vk;
use glam::{Mat4, Vec2, Vec3, Vec4};
use vireo_core::mesh::generators;
use vireo_core::scene::HUD_DISTANCE;
use vireo_core::{GameObject, MeshData};
use vireo_graphics::{Material, PipelineState};

use crate::context::{AppContext, UpdateContext};
use crate::error::AppError;
use crate::handler::AppHandler;

/// Everything the renderer is built for: one merged mesh, the materials
/// and the objects referencing both.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub mesh: MeshData,
    pub materials: Vec<Material>,
    pub objects: Vec<GameObject>,
}

impl Scene {
    /// Index of the first object called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|object| object.name == name)
    }
}

const FLOOR_MATERIAL: usize = 0;
const SUN_MATERIAL: usize = 1;
const TRANSPARENT_MATERIAL: usize = 2;
const HUD_MATERIAL: usize = 3;

/// A floor, an orbiting sun, a spinning panel and two HUD markers.
#[derive(Debug, Default)]
pub struct DemoScene {
    sun: Option<usize>,
    spinner: Option<usize>,
}

impl DemoScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build() -> Scene {
        let mut mesh = MeshData::new();
        let quad = generators::add_quad(&mut mesh);
        let disc = generators::add_ellipse(&mut mesh, 32, 4.0, 4.0);
        let triangle = generators::add_triangle(&mut mesh);

        let materials = vec![
            Material::default().with_color(Vec4::new(0.6, 0.6, 0.6, 1.0)),
            Material::default().with_color(Vec4::new(1.0, 1.0, 0.0, 1.0)),
            Material::default().with_color(Vec4::new(0.0, 0.8, 0.0, 0.66)),
            Material::default()
                .with_color(Vec4::new(1.0, 0.0, 0.1, 0.66))
                .with_state(PipelineState {
                    cull_mode: vk::CullModeFlags::NONE,
                    depth_test: false,
                    depth_write: false,
                    ..Default::default()
                }),
        ];

        let objects = vec![
            GameObject::new("floor", quad, FLOOR_MATERIAL).with_world_matrix(
                Mat4::from_rotation_x(-FRAC_PI_2) * Mat4::from_scale(Vec3::splat(10.0)),
            ),
            GameObject::new("sun", disc, SUN_MATERIAL),
            GameObject::new("spinner", triangle, TRANSPARENT_MATERIAL),
            GameObject::hud("marker_left", quad, HUD_MATERIAL, Vec2::new(-4.0, -4.0), HUD_DISTANCE),
            GameObject::hud("marker_right", quad, HUD_MATERIAL, Vec2::new(4.0, 4.0), HUD_DISTANCE),
        ];

        Scene {
            mesh,
            materials,
            objects,
        }
    }
}

/// Spinner transform at `time` seconds: a slow turn about Y.
fn spinner_matrix(time: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(0.5, 0.0, -4.5)) * Mat4::from_rotation_y(time * 0.2)
}

impl AppHandler for DemoScene {
    fn on_init(&mut self, _ctx: &mut AppContext) -> Result<Scene, AppError> {
        let scene = Self::build();
        self.sun = scene.find("sun");
        self.spinner = scene.find("spinner");
        log::info!(
            "Demo scene: {} objects, {} materials, {} vertices",
            scene.objects.len(),
            scene.materials.len(),
            scene.mesh.vertices().len()
        );
        Ok(scene)
    }

    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> bool {
        if let Some(sun) = self.sun.and_then(|i| ctx.objects.get_mut(i)) {
            sun.world_matrix = ctx.app.light().sun_matrix();
        }
        if let Some(spinner) = self.spinner.and_then(|i| ctx.objects.get_mut(i)) {
            spinner.world_matrix = spinner_matrix(ctx.app.elapsed_time());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_reference_existing_materials() {
        let scene = DemoScene::build();
        assert!(scene
            .objects
            .iter()
            .all(|object| object.material < scene.materials.len()));
        assert_eq!(scene.objects.iter().filter(|o| o.is_hud()).count(), 2);
    }

    #[test]
    fn models_lie_inside_the_mesh() {
        let scene = DemoScene::build();
        let index_count = scene.mesh.indices().len() as u32;
        for object in &scene.objects {
            assert!(object.model.first_index + object.model.index_count <= index_count);
        }
    }

    #[test]
    fn init_remembers_animated_objects() {
        let mut demo = DemoScene::new();
        let scene = demo.on_init(&mut AppContext::default()).unwrap();
        assert_eq!(demo.sun, scene.find("sun"));
        assert_eq!(demo.spinner, Some(2));
    }

    #[test]
    fn spinner_turns_in_place() {
        let start = spinner_matrix(0.0);
        let later = spinner_matrix(5.0);
        assert_eq!(start.w_axis, later.w_axis);
        assert_ne!(start.x_axis, later.x_axis);
    }
}
