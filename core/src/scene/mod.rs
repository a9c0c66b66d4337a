//! Objects drawn by the renderer.
//!
//! A [`GameObject`] pairs a [`Model`] range with a material index and a
//! world transform. Objects never own GPU state; the renderer reserves one
//! dynamic uniform slot per object in the order they are handed to it.

use crate::math::{Mat4, Vec2, Vec3};
use crate::mesh::Model;

/// Default distance in front of the viewer for HUD objects.
pub const HUD_DISTANCE: f32 = -12.0;

/// A drawable instance of a model.
#[derive(Debug, Clone)]
pub struct GameObject {
    pub name: String,
    pub model: Model,
    /// Index into the renderer's material list.
    pub material: usize,
    pub world_matrix: Mat4,
    /// Invisible objects keep their uniform slot but issue no draw.
    pub visible: bool,
    /// Offset from the viewer for objects pinned to the headset.
    pub hud_offset: Option<Vec3>,
}

impl GameObject {
    pub fn new(name: impl Into<String>, model: Model, material: usize) -> Self {
        Self {
            name: name.into(),
            model,
            material,
            world_matrix: Mat4::IDENTITY,
            visible: true,
            hud_offset: None,
        }
    }

    /// An object that stays in front of the viewer at `screen_position`,
    /// `distance` along the view axis, turned to face the viewer.
    pub fn hud(
        name: impl Into<String>,
        model: Model,
        material: usize,
        screen_position: Vec2,
        distance: f32,
    ) -> Self {
        Self {
            hud_offset: Some(screen_position.extend(distance)),
            ..Self::new(name, model, material)
        }
    }

    pub fn with_world_matrix(mut self, world_matrix: Mat4) -> Self {
        self.world_matrix = world_matrix;
        self
    }

    pub fn is_hud(&self) -> bool {
        self.hud_offset.is_some()
    }

    /// Re-anchor a HUD object to the viewer. Other objects are left alone.
    pub fn update(&mut self, viewer_world_matrix: Mat4) {
        let Some(offset) = self.hud_offset else {
            return;
        };

        let anchored = viewer_world_matrix * Mat4::from_translation(offset);
        let to_viewer = (-offset).normalize_or_zero();
        let yaw = to_viewer.x.atan2(to_viewer.z);
        let pitch = (-to_viewer.y).clamp(-1.0, 1.0).asin();

        self.world_matrix =
            anchored * Mat4::from_rotation_y(yaw) * Mat4::from_rotation_x(pitch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_objects_ignore_viewer() {
        let world = Mat4::from_translation(Vec3::new(1.0, 0.0, -3.0));
        let mut object = GameObject::new("car", Model::default(), 0).with_world_matrix(world);
        object.update(Mat4::from_translation(Vec3::splat(5.0)));
        assert_eq!(object.world_matrix, world);
    }

    #[test]
    fn hud_object_follows_viewer() {
        let mut object = GameObject::hud("panel", Model::default(), 1, Vec2::ZERO, HUD_DISTANCE);
        let viewer = Mat4::from_translation(Vec3::new(0.0, 1.7, 0.0));
        object.update(viewer);

        let position = object.world_matrix.w_axis.truncate();
        assert!((position - Vec3::new(0.0, 1.7, HUD_DISTANCE)).length() < 1e-5);
    }

    #[test]
    fn centered_hud_object_faces_viewer() {
        let mut object = GameObject::hud("panel", Model::default(), 1, Vec2::ZERO, HUD_DISTANCE);
        object.update(Mat4::IDENTITY);

        // Offset points down -Z, so the object turns to face +Z: no pitch, no yaw.
        let forward = object.world_matrix.transform_vector3(Vec3::Z);
        assert!((forward - Vec3::Z).length() < 1e-5);
    }
}
