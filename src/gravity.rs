//! Pseudo-relativistic gravity: an inverse-cube bending force standing in
//! for geodesic curvature, plus the scene's fixed radii in geometric units
//! (M = 1, so the Schwarzschild radius is 2).

use glam::Vec3;

pub const MASS: f32 = 1.0;
pub const SCHWARZSCHILD_RADIUS: f32 = 2.0 * MASS;
/// Reference radius for ring and lensing effects, 1.5 Rs.
pub const PHOTON_SPHERE_RADIUS: f32 = 1.5 * SCHWARZSCHILD_RADIUS;
/// Rays inside this radius are considered captured. Kept a hair outside Rs
/// so the march never has to resolve the steepest part of the field.
pub const ABSORPTION_RADIUS: f32 = SCHWARZSCHILD_RADIUS * 1.02;
/// Disk inner edge at the Schwarzschild ISCO, 3 Rs.
pub const DISK_INNER_RADIUS: f32 = 3.0 * SCHWARZSCHILD_RADIUS;
pub const DISK_OUTER_RADIUS: f32 = 8.0 * SCHWARZSCHILD_RADIUS;

/// Tuned bending strength; around 1.5-1.8 reproduces a believable
/// photon-sphere shadow for this force law.
pub const BENDING_K: f32 = 1.6;

const EPSILON: f32 = 1e-4;

/// Inward acceleration at `position`, magnitude k * M * Rs / r^3.
/// Returns zero inside the epsilon guard around the origin.
pub fn acceleration(position: Vec3) -> Vec3 {
    let r2 = position.length_squared();
    if r2 < EPSILON * EPSILON {
        return Vec3::ZERO;
    }
    let r = r2.sqrt();
    let magnitude = BENDING_K * MASS * SCHWARZSCHILD_RADIUS / (r2 * r);
    position * (-magnitude / r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceleration_points_toward_origin() {
        let points = [
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(-3.0, 4.0, 1.0),
            Vec3::new(0.1, -0.2, 0.05),
            Vec3::new(0.0, 40.0, -7.0),
        ];
        for p in points {
            let a = acceleration(p);
            assert!(a.dot(p) < 0.0, "acceleration at {p} not inward");
        }
    }

    #[test]
    fn magnitude_decays_beyond_photon_sphere() {
        let mut last = f32::MAX;
        let mut r = PHOTON_SPHERE_RADIUS;
        while r < 60.0 {
            let mag = acceleration(Vec3::new(r, 0.0, 0.0)).length();
            assert!(mag < last, "magnitude not strictly decreasing at r = {r}");
            last = mag;
            r += 0.5;
        }
    }

    #[test]
    fn inverse_cube_falloff() {
        let a1 = acceleration(Vec3::new(4.0, 0.0, 0.0)).length();
        let a2 = acceleration(Vec3::new(8.0, 0.0, 0.0)).length();
        assert!((a1 / a2 - 8.0).abs() < 1e-3);
    }

    #[test]
    fn origin_is_guarded() {
        assert_eq!(acceleration(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(acceleration(Vec3::splat(1e-5)), Vec3::ZERO);
        let near = acceleration(Vec3::splat(2e-4));
        assert!(near.is_finite());
    }
}
