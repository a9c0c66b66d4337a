//! Math types and helper functions.
//!
//! Rendering math is `glam` (f32, column-major). XR runtimes describe eyes
//! as a [`Pose`] plus a [`Fov`] of four half-angles; the helpers here turn
//! those into the view and projection matrices the shaders consume.

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Position and orientation of a tracked object in a reference space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    /// Pose at the origin with no rotation.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Transform from pose-local space into the reference space
    /// (translation applied after rotation).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_quat(self.orientation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Field of view of one eye, as angles in radians from the view axis.
///
/// Left and down are usually negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    /// Symmetric frustum with the same half-angle on every side.
    pub fn symmetric(half_angle: f32) -> Self {
        Self {
            angle_left: -half_angle,
            angle_right: half_angle,
            angle_up: half_angle,
            angle_down: -half_angle,
        }
    }
}

/// Build an asymmetric perspective projection from per-eye field-of-view angles.
///
/// Depth maps `-near` to -1 and `-far` to 1. The Y axis is flipped
/// (`down - up` height) so clip space matches Vulkan's downward Y.
pub fn projection_from_fov(fov: &Fov, near: f32, far: f32) -> Mat4 {
    let left = fov.angle_left.tan();
    let right = fov.angle_right.tan();
    let down = fov.angle_down.tan();
    let up = fov.angle_up.tan();

    let width = right - left;
    let height = down - up;
    let depth = far - near;

    Mat4::from_cols(
        Vec4::new(2.0 / width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / height, 0.0, 0.0),
        Vec4::new(
            (right + left) / width,
            (up + down) / height,
            -(far + near) / depth,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -(far * (near + near)) / depth, 0.0),
    )
}

/// View matrix of an eye: the inverse of its pose transform.
pub fn view_from_pose(pose: &Pose) -> Mat4 {
    pose.to_matrix().inverse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn symmetric_projection_coefficients() {
        let m = projection_from_fov(&Fov::symmetric(FRAC_PI_4), 0.01, 250.0);
        assert!(approx(m.x_axis.x, 1.0));
        assert!(approx(m.y_axis.y, -1.0));
        assert!(approx(m.z_axis.x, 0.0));
        assert!(approx(m.z_axis.y, 0.0));
        assert_eq!(m.z_axis.w, -1.0);
        assert_eq!(m.w_axis.w, 0.0);
    }

    #[test]
    fn projection_maps_clip_planes() {
        let (near, far) = (0.01, 250.0);
        let m = projection_from_fov(&Fov::symmetric(FRAC_PI_4), near, far);

        let on_near = m * Vec4::new(0.0, 0.0, -near, 1.0);
        assert!(approx(on_near.z / on_near.w, -1.0));

        let on_far = m * Vec4::new(0.0, 0.0, -far, 1.0);
        assert!((on_far.z / on_far.w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn asymmetric_projection_shifts_center() {
        let fov = Fov {
            angle_left: -0.9,
            angle_right: 0.7,
            angle_up: 0.8,
            angle_down: -0.8,
        };
        let m = projection_from_fov(&fov, 0.1, 100.0);
        let expected = (0.7f32.tan() + (-0.9f32).tan()) / (0.7f32.tan() - (-0.9f32).tan());
        assert!(approx(m.z_axis.x, expected));
    }

    #[test]
    fn pose_matrix_translation_after_rotation() {
        let pose = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(FRAC_PI_2));
        let m = pose.to_matrix();
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));

        let moved = m.transform_point3(Vec3::X);
        assert!(approx(moved.x, 1.0));
        assert!(approx(moved.z, 2.0));
    }

    #[test]
    fn view_matrix_brings_eye_to_origin() {
        let pose = Pose::new(Vec3::new(0.5, 1.6, -2.0), Quat::from_rotation_x(0.3));
        let view = view_from_pose(&pose);
        let origin = view.transform_point3(pose.position);
        assert!(origin.length() < 1e-5);
    }
}
