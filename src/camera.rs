//! Orbit camera around the hole. Input writes target angles; the rendered
//! pose eases toward them with a fixed per-frame smoothing step, so all
//! motion (drag, zoom, touch) shares one damping path.

use glam::Vec3;

const SENSITIVITY: f32 = 0.005;
const ELEVATION_LIMIT: f32 = 0.45 * std::f32::consts::PI;
const DISTANCE_MIN: f32 = 10.0;
const DISTANCE_MAX: f32 = 100.0;
const ZOOM_STEP: f32 = 0.1;
const SMOOTHING: f32 = 0.15;

const DEFAULT_AZIMUTH: f32 = std::f32::consts::PI;
const DEFAULT_ELEVATION: f32 = 0.17;
const DEFAULT_DISTANCE: f32 = 35.0;

#[derive(Clone, Copy, Debug)]
pub struct OrbitCamera {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    target_azimuth: f32,
    target_elevation: f32,
    target_distance: f32,
    pub fov_y: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::with_pose(DEFAULT_AZIMUTH, DEFAULT_ELEVATION, DEFAULT_DISTANCE)
    }
}

impl OrbitCamera {
    /// Camera already settled at the given pose (no easing pending).
    pub fn with_pose(azimuth: f32, elevation: f32, distance: f32) -> Self {
        let elevation = elevation.clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
        let distance = distance.clamp(DISTANCE_MIN, DISTANCE_MAX);
        Self {
            azimuth,
            elevation,
            distance,
            target_azimuth: azimuth,
            target_elevation: elevation,
            target_distance: distance,
            fov_y: 60.0_f32.to_radians(),
        }
    }

    /// Apply a pointer drag in pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.target_azimuth -= dx * SENSITIVITY;
        self.target_elevation =
            (self.target_elevation + dy * SENSITIVITY).clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
    }

    /// Scroll notches: positive zooms in 10% per notch, negative out.
    pub fn zoom(&mut self, notches: f32) {
        let factor = if notches > 0.0 {
            (1.0 - ZOOM_STEP).powf(notches)
        } else {
            (1.0 + ZOOM_STEP).powf(-notches)
        };
        self.target_distance = (self.target_distance * factor).clamp(DISTANCE_MIN, DISTANCE_MAX);
    }

    /// Pinch scale from touch input, applied straight to the distance.
    pub fn pinch(&mut self, scale: f32) {
        if scale > 0.0 {
            self.target_distance = (self.target_distance / scale).clamp(DISTANCE_MIN, DISTANCE_MAX);
        }
    }

    /// One smoothing step toward the targets. Called once per frame before
    /// the pose is read.
    pub fn update(&mut self) {
        self.azimuth += (self.target_azimuth - self.azimuth) * SMOOTHING;
        self.elevation += (self.target_elevation - self.elevation) * SMOOTHING;
        self.distance += (self.target_distance - self.distance) * SMOOTHING;
    }

    /// World-space eye position, Y up, orbiting the origin.
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.elevation.cos() * self.azimuth.sin(),
            self.distance * self.elevation.sin(),
            self.distance * self.elevation.cos() * self.azimuth.cos(),
        )
    }

    /// Ray-generation basis for the current pose, looking at the origin.
    pub fn basis(&self) -> CameraBasis {
        let position = self.position();
        let forward = (-position).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward);
        CameraBasis {
            position,
            forward,
            right,
            up,
            tan_half_fov: (self.fov_y * 0.5).tan(),
        }
    }
}

/// Snapshot of the camera frame used to generate primary rays. Plain data,
/// cheap to copy into the per-frame context.
#[derive(Clone, Copy, Debug)]
pub struct CameraBasis {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub tan_half_fov: f32,
}

impl CameraBasis {
    /// Primary ray through normalized device coordinates in [-1, 1], with
    /// +y pointing up the image.
    pub fn ray_direction(&self, ndc_x: f32, ndc_y: f32, aspect: f32) -> Vec3 {
        (self.forward
            + self.right * (ndc_x * aspect * self.tan_half_fov)
            + self.up * (ndc_y * self.tan_half_fov))
            .normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn default_pose_is_the_canonical_view() {
        let cam = OrbitCamera::default();
        assert!((cam.azimuth - PI).abs() < 1e-6);
        assert!((cam.elevation - 0.17).abs() < 1e-6);
        assert!((cam.distance - 35.0).abs() < 1e-6);
    }

    #[test]
    fn default_position_sits_behind_and_above() {
        let cam = OrbitCamera::default();
        let p = cam.position();
        assert!(p.x.abs() < 1e-4);
        assert!((p.y - 35.0 * 0.17_f32.sin()).abs() < 1e-4);
        assert!((p.z + 35.0 * 0.17_f32.cos()).abs() < 1e-4);
    }

    #[test]
    fn elevation_is_clamped() {
        let mut cam = OrbitCamera::default();
        cam.orbit(0.0, 10_000.0);
        for _ in 0..200 {
            cam.update();
        }
        assert!(cam.elevation <= ELEVATION_LIMIT + 1e-5);
        cam.orbit(0.0, -50_000.0);
        for _ in 0..200 {
            cam.update();
        }
        assert!(cam.elevation >= -ELEVATION_LIMIT - 1e-5);
    }

    #[test]
    fn distance_is_clamped() {
        let mut cam = OrbitCamera::default();
        for _ in 0..100 {
            cam.zoom(5.0);
        }
        for _ in 0..200 {
            cam.update();
        }
        assert!((cam.distance - DISTANCE_MIN).abs() < 1e-3);
        for _ in 0..100 {
            cam.zoom(-5.0);
        }
        for _ in 0..200 {
            cam.update();
        }
        assert!((cam.distance - DISTANCE_MAX).abs() < 1e-3);
    }

    #[test]
    fn orbit_round_trip_returns_home() {
        let mut cam = OrbitCamera::default();
        cam.orbit(120.0, 40.0);
        for _ in 0..10 {
            cam.update();
        }
        cam.orbit(-120.0, -40.0);
        for _ in 0..200 {
            cam.update();
        }
        assert!((cam.azimuth - PI).abs() < 1e-4);
        assert!((cam.elevation - 0.17).abs() < 1e-4);
    }

    #[test]
    fn smoothing_moves_a_fixed_fraction() {
        let mut cam = OrbitCamera::default();
        cam.orbit(100.0, 0.0);
        let target_delta = -100.0 * SENSITIVITY;
        cam.update();
        assert!((cam.azimuth - (PI + target_delta * SMOOTHING)).abs() < 1e-5);
    }

    #[test]
    fn basis_is_orthonormal_and_centered() {
        let cam = OrbitCamera::with_pose(1.3, 0.3, 42.0);
        let b = cam.basis();
        assert!((b.forward.length() - 1.0).abs() < 1e-5);
        assert!((b.right.length() - 1.0).abs() < 1e-5);
        assert!((b.up.length() - 1.0).abs() < 1e-5);
        assert!(b.forward.dot(b.right).abs() < 1e-5);
        assert!(b.forward.dot(b.up).abs() < 1e-5);
        assert!(b.right.dot(b.up).abs() < 1e-5);
        // The center ray must aim straight at the origin.
        let center = b.ray_direction(0.0, 0.0, 1.77);
        assert!((center - (-b.position).normalize()).length() < 1e-5);
    }

    #[test]
    fn zoom_direction_matches_sign() {
        let mut cam = OrbitCamera::default();
        cam.zoom(1.0);
        for _ in 0..200 {
            cam.update();
        }
        assert!(cam.distance < 35.0);
        let near = cam.distance;
        cam.zoom(-2.0);
        for _ in 0..200 {
            cam.update();
        }
        assert!(cam.distance > near);
    }
}
