//! Scene camera and its client-side state.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Perspective/parallel camera of a renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub focal_point: DVec3,
    pub view_up: DVec3,
    /// Vertical view angle in degrees.
    pub view_angle: f64,
    pub clipping_range: [f64; 2],
    pub parallel_projection: bool,
    pub parallel_scale: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 1.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            view_angle: 30.0,
            clipping_range: [0.01, 1000.01],
            parallel_projection: false,
            parallel_scale: 1.0,
        }
    }
}

impl Camera {
    /// Unit vector from position towards the focal point.
    pub fn direction_of_projection(&self) -> DVec3 {
        (self.focal_point - self.position).normalize_or(DVec3::NEG_Z)
    }

    /// Distance between position and focal point.
    pub fn distance(&self) -> f64 {
        self.position.distance(self.focal_point)
    }

    /// Frame an axis-aligned box: keep the view direction, move the focal point
    /// to the box center and back off until the bounding sphere fits.
    pub fn reset_to_bounds(&mut self, min: DVec3, max: DVec3) {
        let center = (min + max) * 0.5;
        let mut radius = (max - min).length() * 0.5;
        if radius <= 0.0 {
            radius = 0.5;
        }
        let half_angle = (self.view_angle.to_radians() * 0.5).max(1e-6);
        let distance = radius / half_angle.sin();
        let dir = self.direction_of_projection();

        self.focal_point = center;
        self.position = center - dir * distance;
        self.parallel_scale = radius;
        self.clipping_range = [(distance - radius).max(distance * 1e-3), distance + radius];
    }
}

/// Camera properties exchanged with the client (camelCase on the wire).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub position: [f64; 3],
    pub focal_point: [f64; 3],
    pub view_up: [f64; 3],
    pub view_angle: f64,
    pub clipping_range: [f64; 2],
    pub parallel_projection: bool,
    pub parallel_scale: f64,
}

impl From<&Camera> for CameraState {
    fn from(c: &Camera) -> Self {
        Self {
            position: c.position.to_array(),
            focal_point: c.focal_point.to_array(),
            view_up: c.view_up.to_array(),
            view_angle: c.view_angle,
            clipping_range: c.clipping_range,
            parallel_projection: c.parallel_projection,
            parallel_scale: c.parallel_scale,
        }
    }
}

impl CameraState {
    /// Write this state into a camera.
    pub fn apply_to(&self, camera: &mut Camera) {
        camera.position = DVec3::from_array(self.position);
        camera.focal_point = DVec3::from_array(self.focal_point);
        camera.view_up = DVec3::from_array(self.view_up);
        camera.view_angle = self.view_angle;
        camera.clipping_range = self.clipping_range;
        camera.parallel_projection = self.parallel_projection;
        camera.parallel_scale = self.parallel_scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_direction() {
        let mut cam = Camera::default();
        cam.reset_to_bounds(DVec3::splat(-1.0), DVec3::splat(1.0));
        assert_eq!(cam.focal_point, DVec3::ZERO);
        assert!(cam.direction_of_projection().abs_diff_eq(DVec3::NEG_Z, 1e-12));
        let radius = 3f64.sqrt();
        let expected = radius / (15f64.to_radians()).sin();
        assert!((cam.distance() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_state_round_trip() {
        let mut cam = Camera::default();
        cam.position = DVec3::new(4.0, 5.0, 6.0);
        let state = CameraState::from(&cam);
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("focalPoint").is_some());

        let mut other = Camera::default();
        state.apply_to(&mut other);
        assert_eq!(other, cam);
    }
}
