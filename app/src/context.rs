//! Per-run state handed to the [`AppHandler`](crate::AppHandler).

use glam::{Mat4, Vec3};
use vireo_core::{FrameTimer, GameObject};
use vireo_xr::Headset;

/// Distance and height of the orbiting sun from the scene origin.
const SUN_OFFSET: Vec3 = Vec3::new(0.0, 5.0, 50.0);

/// A sun orbiting the scene origin around the Y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    /// Orbit angle in degrees, in `[0, 360)`.
    angle: f32,
    /// Orbit speed in degrees per second.
    speed: f32,
    direction: Vec3,
}

impl LightState {
    pub fn new(speed: f32) -> Self {
        let mut light = Self {
            angle: 0.0,
            speed,
            direction: Vec3::ZERO,
        };
        light.direction = -light.sun_position().normalize();
        light
    }

    /// Advance the orbit by `delta_seconds`.
    pub fn update(&mut self, delta_seconds: f32) {
        self.direction = -self.sun_position().normalize();
        self.angle += delta_seconds * self.speed;
        if self.angle >= 360.0 {
            self.angle = 0.0;
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Direction the light travels, from the sun towards the origin.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn sun_position(&self) -> Vec3 {
        Mat4::from_rotation_y(self.angle.to_radians()).transform_point3(SUN_OFFSET)
    }

    /// World matrix for an object drawn at the sun.
    pub fn sun_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.sun_position())
    }
}

impl Default for LightState {
    fn default() -> Self {
        Self::new(10.0)
    }
}

/// State owned by the frame loop for the whole run.
#[derive(Debug, Default)]
pub struct AppContext {
    pub(crate) timer: FrameTimer,
    pub(crate) light: LightState,
    pub(crate) frame_number: u64,
    pub(crate) rendered_frames: u64,
}

impl AppContext {
    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn light(&self) -> &LightState {
        &self.light
    }

    /// Frame loop iterations so far, rendered or not.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }

    pub fn delta_time(&self) -> f32 {
        self.timer.delta_seconds()
    }

    pub fn elapsed_time(&self) -> f32 {
        self.timer.elapsed_seconds()
    }
}

/// What a handler may touch while a frame is being prepared.
pub struct UpdateContext<'a> {
    pub app: &'a AppContext,
    pub headset: &'a mut Headset,
    pub objects: &'a mut [GameObject],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_points_from_sun_to_origin() {
        let light = LightState::default();
        let expected = -SUN_OFFSET.normalize();
        assert!((light.direction() - expected).length() < 1e-6);
    }

    #[test]
    fn orbit_wraps_at_full_turn() {
        let mut light = LightState::new(90.0);
        for _ in 0..3 {
            light.update(1.0);
        }
        assert!((light.angle() - 270.0).abs() < 1e-4);

        light.update(1.0);
        assert_eq!(light.angle(), 0.0);
    }

    #[test]
    fn sun_orbits_around_y() {
        let mut light = LightState::new(90.0);
        light.update(1.0);

        let position = light.sun_position();
        assert!((position - Vec3::new(50.0, 5.0, 0.0)).length() < 1e-3);
        assert_eq!(light.sun_matrix().w_axis.truncate(), position);
    }
}
