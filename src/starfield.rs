//! Background compositor: photon-ring stack plus an analytic starfield,
//! blended behind the disk according to the transmission a ray has left.

use glam::Vec3;

use crate::integrator::{TraceResult, SATURATION_THRESHOLD};
use crate::noise::{fbm, hash31};

/// Ring stack around the critical curve, ordered outside-in. Each entry is
/// (center offset from the photon sphere, Gaussian sigma, gain); sharpness
/// increases as the offset shrinks.
const RINGS: [(f32, f32, f32); 5] = [
    (1.40, 0.55, 0.30),
    (0.80, 0.30, 0.45),
    (0.45, 0.16, 0.70),
    (0.22, 0.10, 1.00),
    (0.08, 0.06, 1.50),
];
const RING_TINT: Vec3 = Vec3::new(1.0, 0.78, 0.50);
const RING_GAIN: f32 = 0.9;

const LENS_GAIN: f32 = 2.2;
const LENS_FALLOFF: f32 = 1.2;

const STAR_LAYERS: u32 = 4;
const STAR_THRESHOLD: f32 = 0.982;
const STAR_WARM: Vec3 = Vec3::new(1.0, 0.82, 0.60);
const STAR_COOL: Vec3 = Vec3::new(0.65, 0.75, 1.0);

/// Time-independent radial profile of the ring stack. Geometry lives here;
/// animation is a separate multiplicative modulation.
fn ring_profile(min_photon_distance: f32) -> f32 {
    let mut sum = 0.0;
    for &(offset, sigma, gain) in RINGS.iter() {
        let d = min_photon_distance - offset;
        sum += gain * (-d * d / (2.0 * sigma * sigma)).exp();
    }
    sum
}

/// Full ring color: profile shaped by a flowing brightness wave that drifts
/// around the ring over time without moving the ring itself.
fn ring_color(min_photon_distance: f32, angle: f32, time: f32) -> Vec3 {
    let flow = 0.85 + 0.15 * (3.0 * angle + 0.6 * time).sin();
    RING_TINT * (ring_profile(min_photon_distance) * flow * RING_GAIN)
}

fn star_layer(dir: Vec3, layer: u32) -> Vec3 {
    let scale = 40.0 + 25.0 * layer as f32;
    let p = dir * scale;
    let cell = p.floor();
    let h = hash31(cell + Vec3::splat(layer as f32 * 17.0));
    if h < STAR_THRESHOLD {
        return Vec3::ZERO;
    }
    // Jittered centroid inside the cell, never flush against a wall.
    let jitter = Vec3::new(
        hash31(cell + Vec3::new(3.1, 7.7, 1.3)),
        hash31(cell + Vec3::new(9.2, 4.4, 6.8)),
        hash31(cell + Vec3::new(1.9, 8.5, 2.6)),
    );
    let centroid = cell + Vec3::splat(0.2) + jitter * 0.6;
    let falloff = (-(p - centroid).length_squared() * 18.0).exp();
    let magnitude = ((h - STAR_THRESHOLD) / (1.0 - STAR_THRESHOLD)).powf(0.4);
    let temperature = hash31(cell * 1.93 + Vec3::splat(40.0));
    let tint = STAR_COOL.lerp(STAR_WARM, temperature);
    tint * (falloff * magnitude / (1.0 + layer as f32 * 0.6))
}

/// Faint emission nebulae plus a dusty galactic band across the sky.
fn nebula(dir: Vec3) -> Vec3 {
    let n = fbm(dir * 3.5 + Vec3::new(7.0, 0.0, 3.0));
    let hue = fbm(dir * 2.1 + Vec3::new(0.0, 11.0, 5.0));
    let tint = Vec3::new(0.04, 0.05, 0.12).lerp(Vec3::new(0.10, 0.06, 0.16), hue);
    let cloud = tint * (n * n * 1.6);

    let band_normal = Vec3::new(0.2, 1.0, 0.15).normalize();
    let band = (-(dir.dot(band_normal)).powi(2) * 22.0).exp();
    let dust = fbm(dir * 8.0 + Vec3::new(3.3, 1.1, 9.4));
    let galaxy = Vec3::new(0.10, 0.085, 0.07) * (band * (0.4 + 0.6 * dust));

    cloud + galaxy
}

fn background(dir: Vec3) -> Vec3 {
    let mut color = nebula(dir);
    for layer in 0..STAR_LAYERS {
        color += star_layer(dir, layer);
    }
    color
}

/// Combine accumulated disk emission with rings and the background sky.
/// Ring light scales with remaining transmission, so fully absorbed rays
/// keep none of it; stars are cut off once a ray is effectively opaque.
pub fn composite(result: &TraceResult, time: f32) -> Vec3 {
    let mut color = result.color;
    let transmission = result.transmission;
    let dir = result.final_dir;
    let angle = dir.y.atan2(dir.x);

    color += ring_color(result.min_photon_distance, angle, time) * transmission;

    if transmission > SATURATION_THRESHOLD {
        let lens = 1.0 + LENS_GAIN * (-result.min_photon_distance * LENS_FALLOFF).exp();
        color += background(dir) * (transmission * lens);
    }
    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::Outcome;

    fn escaped(dir: Vec3, transmission: f32, min_photon_distance: f32) -> TraceResult {
        TraceResult {
            color: Vec3::ZERO,
            transmission,
            outcome: Outcome::Escaped,
            min_radius: min_photon_distance + 3.0,
            min_photon_distance,
            crossings: 0,
            final_dir: dir.normalize(),
            steps: 100,
        }
    }

    fn luminance(c: Vec3) -> f32 {
        c.x * 0.2126 + c.y * 0.7152 + c.z * 0.0722
    }

    #[test]
    fn ring_position_does_not_move_with_time() {
        // The brightest distance bin of the ring stack must not shift with
        // time; only its brightness may.
        let argmax = |time: f32| {
            let mut best = (0usize, f32::MIN);
            for i in 0..400 {
                let d = i as f32 * 0.005;
                let lum = luminance(ring_color(d, 1.3, time));
                if lum > best.1 {
                    best = (i, lum);
                }
            }
            best.0
        };
        assert_eq!(argmax(0.0), argmax(3.7));
        assert_eq!(argmax(0.0), argmax(11.2));
    }

    #[test]
    fn ring_brightness_flows_with_time() {
        let a = ring_color(0.1, 1.0, 0.0);
        let b = ring_color(0.1, 1.0, 1.0);
        assert!(a != b);
    }

    #[test]
    fn opaque_rays_keep_only_disk_color() {
        let disk_color = Vec3::new(0.4, 0.2, 0.1);
        let mut result = escaped(Vec3::new(0.5, 0.2, -1.0), 0.0, 0.3);
        result.color = disk_color;
        result.outcome = Outcome::Absorbed;
        assert_eq!(composite(&result, 2.0), disk_color);
    }

    #[test]
    fn near_critical_rays_are_amplified() {
        let dir = Vec3::new(0.4, 0.3, -0.9);
        let close = composite(&escaped(dir, 1.0, 0.05), 0.0);
        let far = composite(&escaped(dir, 1.0, 6.0), 0.0);
        assert!(luminance(close) > luminance(far));
    }

    #[test]
    fn background_scales_with_transmission() {
        let dir = Vec3::new(-0.2, 0.4, 0.8);
        let open = composite(&escaped(dir, 1.0, 2.0), 0.0);
        let dimmed = composite(&escaped(dir, 0.5, 2.0), 0.0);
        assert!(luminance(open) > luminance(dimmed));
    }

    #[test]
    fn sky_contains_stars_somewhere() {
        // Sweep a fan of directions; the lattice must light at least one.
        let mut peak = 0.0_f32;
        for i in 0..64 {
            for j in 0..32 {
                let az = i as f32 * 0.098;
                let el = (j as f32 - 16.0) * 0.09;
                let dir = Vec3::new(el.cos() * az.cos(), el.sin(), el.cos() * az.sin());
                let mut star = Vec3::ZERO;
                for layer in 0..STAR_LAYERS {
                    star += star_layer(dir, layer);
                }
                peak = peak.max(luminance(star));
            }
        }
        assert!(peak > 0.005, "no star lit across the sample fan, peak {peak}");
    }

    #[test]
    fn background_is_deterministic() {
        let dir = Vec3::new(0.31, -0.12, 0.94).normalize();
        assert_eq!(background(dir), background(dir));
    }
}
