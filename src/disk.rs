//! Volumetric accretion disk model. One call per ray-march sample point,
//! producing an emission color and an opacity contribution for that step.
//!
//! Everything here is visual tuning on top of a handful of physically
//! motivated shapes: Keplerian differential rotation, a radial temperature
//! falloff, Doppler beaming and gravitational redshift, and a Gaussian
//! vertical profile supplied by the integrator.

use glam::Vec3;

use crate::gravity::{DISK_INNER_RADIUS, DISK_OUTER_RADIUS, MASS, SCHWARZSCHILD_RADIUS};
use crate::noise::{fbm, hash11, noise3, smoothstep};

/// Emission and opacity for one sample point.
#[derive(Clone, Copy, Debug)]
pub struct DiskSample {
    pub color: Vec3,
    pub opacity: f32,
}

impl DiskSample {
    pub const EMPTY: Self = Self { color: Vec3::ZERO, opacity: 0.0 };
}

/// Pattern rotation rate multiplier on top of the Keplerian angular velocity.
const ORBIT_PITCH: f32 = 1.6;
/// Absorption coefficient scale converting density to optical depth per unit
/// step length.
const OPACITY_K: f32 = 4.5;
/// First lensed image order (two midplane crossings) brightness multiplier.
const SECONDARY_IMAGE_BOOST: f32 = 2.5;

const BASE_DENSITY: f32 = 0.25;
const TURBULENCE_WEIGHT: f32 = 0.85;
const SHOCK_WEIGHT: f32 = 1.1;
const FILAMENT_WEIGHT: f32 = 0.9;
const CHAOS_WEIGHT: f32 = 0.8;
const SPOT_DENSITY_WEIGHT: f32 = 0.7;
const GLOW_WEIGHT: f32 = 1.2;

/// Filament bands: (angular frequency, sharpening power, weight). Frequency
/// and power climb together so each band contributes thinner, rarer threads.
const FILAMENT_BANDS: [(f32, i32, f32); 4] = [
    (48.0, 4, 1.0),
    (110.0, 5, 0.7),
    (210.0, 6, 0.5),
    (340.0, 7, 0.35),
];

const RAMP_STOPS: [f32; 4] = [0.0, 0.5, 1.0, 2.0];
const RAMP_COLORS: [Vec3; 4] = [
    Vec3::new(0.55, 0.16, 0.03), // deep orange
    Vec3::new(1.00, 0.42, 0.08), // warm orange
    Vec3::new(1.00, 0.75, 0.30), // gold
    Vec3::new(1.00, 0.93, 0.82), // warm white
];

/// Characteristic vertical thickness at radius `r`; flares linearly from the
/// inner edge outward.
pub fn scale_height(r: f32) -> f32 {
    let t = ((r - DISK_INNER_RADIUS) / (DISK_OUTER_RADIUS - DISK_INNER_RADIUS)).clamp(0.0, 1.0);
    0.22 + 0.85 * t
}

/// Keplerian angular velocity sqrt(M / r^3).
#[inline]
pub fn angular_velocity(r: f32) -> f32 {
    (MASS / (r * r * r)).sqrt()
}

/// Piecewise-linear warm blackbody-like ramp over the fixed control stops.
pub fn color_ramp(t: f32) -> Vec3 {
    let t = t.max(0.0);
    if t >= RAMP_STOPS[3] {
        return RAMP_COLORS[3];
    }
    let mut i = 0;
    while i + 2 < RAMP_STOPS.len() && t > RAMP_STOPS[i + 1] {
        i += 1;
    }
    let span = RAMP_STOPS[i + 1] - RAMP_STOPS[i];
    let f = ((t - RAMP_STOPS[i]) / span).clamp(0.0, 1.0);
    RAMP_COLORS[i].lerp(RAMP_COLORS[i + 1], f)
}

fn filament_bands(phase: f32, r: f32, turb_a: f32, turb_b: f32) -> (f32, f32) {
    let mut total = 0.0;
    let mut core: f32 = 0.0;
    for (i, &(freq, power, weight)) in FILAMENT_BANDS.iter().enumerate() {
        let fi = i as f32;
        // Two incommensurate waves per band keep the threads from repeating.
        let wave = 0.6 * (phase * freq + r * (2.1 + fi)).sin()
            + 0.4 * (phase * freq * 1.31 - r * 3.7 + fi * 1.7).sin();
        let sharp = (0.5 + 0.5 * wave).max(0.0).powi(power);
        let mask = smoothstep(0.35, 0.7, if i % 2 == 0 { turb_a } else { turb_b });
        total += weight * sharp * mask;
        core = core.max(sharp * mask);
    }
    (total, core)
}

fn spiral_shocks(azimuth: f32, r: f32, time: f32) -> f32 {
    let radial = (r - 2.0 * DISK_INNER_RADIUS) / (0.8 * DISK_INNER_RADIUS);
    let envelope = (-radial * radial).exp();
    let a1 = azimuth - 3.5 * (r / DISK_INNER_RADIUS).ln() + time * 0.25;
    let s1 = smoothstep(0.88, 0.99, (a1 * 2.0).sin());
    // Second front winds the other way, slightly tighter.
    let a2 = azimuth + 2.2 * (r / DISK_INNER_RADIUS).ln() - time * 0.18;
    let s2 = smoothstep(0.90, 0.995, (a2 * 3.0).sin());
    envelope * (s1 + 0.6 * s2)
}

fn hot_spots(r: f32, azimuth: f32, time: f32) -> f32 {
    let mut spots = 0.0;
    for i in 0..6 {
        let fi = i as f32;
        let spot_r = DISK_INNER_RADIUS + (DISK_OUTER_RADIUS - DISK_INNER_RADIUS) * (0.08 + 0.15 * fi);
        let spot_az = fi * 2.4 + hash11(fi * 13.7) * 1.9 + time * angular_velocity(spot_r) * ORBIT_PITCH;
        let dr = r - spot_r;
        let daz = (azimuth - spot_az).sin().atan2((azimuth - spot_az).cos());
        let arc = daz * spot_r;
        let size = 0.45 + 0.35 * hash11(fi + 4.2);
        let blob = (-(dr * dr + arc * arc) / (size * size)).exp();
        let flare = 0.6 + 0.4 * (time * (0.8 + 0.5 * hash11(fi + 9.1)) + fi * 1.3).sin();
        spots += blob * flare;
    }
    spots
}

fn isco_chaos(r: f32, phase: f32, time: f32) -> f32 {
    let proximity = 1.0 - smoothstep(DISK_INNER_RADIUS, DISK_INNER_RADIUS * 1.6, r);
    if proximity <= 0.0 {
        return 0.0;
    }
    let n = noise3(Vec3::new(phase * 14.0, r * 6.0, time * 1.3));
    // Radial plunge streaks, sharpened.
    let streak = (0.5 + 0.5 * (phase * 3.0 - (r - DISK_INNER_RADIUS) * 9.0 + time * 2.5).sin()).powi(3);
    proximity * (0.7 * n + 0.6 * streak)
}

/// Sample the disk at `position`.
///
/// `vertical_weight` is the Gaussian vertical profile already evaluated by
/// the integrator at the warped sample height; `step_len` is the march step
/// the opacity is integrated over. `crossings` is the midplane crossing
/// count used to brighten higher lensed image orders.
#[allow(clippy::too_many_arguments)]
pub fn sample(
    position: Vec3,
    ray_dir: Vec3,
    time: f32,
    crossings: u32,
    vertical_weight: f32,
    step_len: f32,
    doppler: bool,
    redshift: bool,
) -> DiskSample {
    let r = (position.x * position.x + position.z * position.z).sqrt().max(1e-3);
    if r < DISK_INNER_RADIUS * 0.95 || r > DISK_OUTER_RADIUS * 1.02 {
        return DiskSample::EMPTY;
    }

    // Differential rotation: pattern azimuth advances at the local Keplerian
    // rate, so inner material visibly outruns the outer disk.
    let azimuth = position.z.atan2(position.x);
    let phase = azimuth - angular_velocity(r) * time * ORBIT_PITCH;

    // Turbulence masks.
    let turb_a = fbm(Vec3::new(phase * 2.5, r * 0.9, time * 0.12));
    let turb_b = fbm(Vec3::new(r * 1.6 - time * 0.07, phase * 4.0, 7.3));
    let clump = noise3(Vec3::new(phase * 8.0, r * 3.0, time * 0.2));

    let (filaments, filament_core) = filament_bands(phase, r, turb_a, turb_b);
    let shock = spiral_shocks(azimuth, r, time);
    let spots = hot_spots(r, azimuth, time);
    let chaos = isco_chaos(r, phase, time);

    let inner_fade = smoothstep(DISK_INNER_RADIUS * 0.95, DISK_INNER_RADIUS * 1.12, r);
    let outer_fade = 1.0 - smoothstep(DISK_OUTER_RADIUS * 0.85, DISK_OUTER_RADIUS * 1.02, r);
    let edge_fade = inner_fade * outer_fade;
    let glow_arg = (r - DISK_INNER_RADIUS) / 0.5;
    let inner_glow = (-glow_arg * glow_arg).exp();

    let turbulence = turb_a * (0.55 + 0.45 * turb_b) + 0.3 * clump;
    let density = (edge_fade
        * (BASE_DENSITY
            + TURBULENCE_WEIGHT * turbulence
            + SHOCK_WEIGHT * shock
            + FILAMENT_WEIGHT * filaments
            + CHAOS_WEIGHT * chaos
            + SPOT_DENSITY_WEIGHT * spots
            + GLOW_WEIGHT * inner_glow))
        .max(0.0);

    let mut temperature = (DISK_INNER_RADIUS / r).powf(0.85)
        + 0.55 * inner_glow
        + 0.35 * shock
        + 0.50 * spots
        + 0.40 * chaos
        + 0.25 * filament_core;

    // Higher lensed image orders pick up flux from repeated light wrapping.
    let image_boost = match crossings {
        0 | 1 => 1.0,
        2 => {
            temperature *= 1.2;
            SECONDARY_IMAGE_BOOST
        }
        n => {
            temperature *= 1.25;
            3.0 + 0.5 * n as f32
        }
    };

    let mut doppler_gain = 1.0;
    if doppler {
        let speed = (MASS / r).sqrt();
        let tangent = Vec3::new(-azimuth.sin(), 0.0, azimuth.cos());
        // Positive when the material moves toward the observer.
        let v_los = -speed * tangent.dot(ray_dir);
        let g = (1.0 / (1.0 - v_los)).clamp(0.4, 2.5);
        doppler_gain = g * g;
        temperature *= g.clamp(0.7, 1.4);
    }

    let mut redshift_gain = 1.0;
    if redshift {
        let f = (1.0 - SCHWARZSCHILD_RADIUS / r).max(0.2).sqrt();
        redshift_gain = f;
        temperature *= f;
    }

    let mut color = color_ramp(temperature);
    let white_mix = (0.35 * spots + 0.30 * filament_core + 0.15 * clump).clamp(0.0, 0.8);
    color = color.lerp(Vec3::new(1.0, 0.97, 0.92), white_mix);
    // Hotter material radiates more; keeps the inner disk in HDR territory
    // for the bloom pass.
    color *= 0.4 + 1.6 * temperature.min(2.5);

    let optical_depth = density * vertical_weight * OPACITY_K * step_len;
    let base_opacity = 1.0 - (-optical_depth).exp();
    let opacity = (base_opacity * image_boost * doppler_gain * redshift_gain).clamp(0.0, 1.0);

    DiskSample { color, opacity }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(r: f32, crossings: u32, doppler: bool, redshift: bool) -> DiskSample {
        sample(
            Vec3::new(r, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            0.0,
            crossings,
            0.8,
            0.05,
            doppler,
            redshift,
        )
    }

    #[test]
    fn rejects_outside_radial_bounds() {
        // Just past the outer edge threshold.
        let outside = sample_at(DISK_OUTER_RADIUS * 1.05, 0, true, true);
        assert_eq!(outside.opacity, 0.0);

        let inside_hole = sample_at(DISK_INNER_RADIUS * 0.94, 0, true, true);
        assert_eq!(inside_hole.opacity, 0.0);
    }

    #[test]
    fn emits_inside_the_disk() {
        let s = sample_at(DISK_INNER_RADIUS * 1.4, 0, false, false);
        assert!(s.opacity > 0.0);
        assert!(s.opacity <= 1.0);
        assert!(s.color.x > 0.0);
    }

    #[test]
    fn secondary_image_is_at_least_twice_as_bright() {
        let primary = sample_at(DISK_INNER_RADIUS * 1.5, 0, false, false);
        let secondary = sample_at(DISK_INNER_RADIUS * 1.5, 2, false, false);
        assert!(primary.opacity > 0.0);
        assert!(secondary.opacity >= 2.0 * primary.opacity);
    }

    #[test]
    fn higher_orders_keep_growing() {
        let r = DISK_INNER_RADIUS * 1.5;
        let o2 = sample_at(r, 2, false, false).opacity;
        let o3 = sample_at(r, 3, false, false).opacity;
        let o5 = sample_at(r, 5, false, false).opacity;
        assert!(o3 >= o2);
        assert!(o5 >= o3);
    }

    #[test]
    fn emission_is_symmetric_without_doppler() {
        let pos = Vec3::new(DISK_INNER_RADIUS * 1.5, 0.0, 0.0);
        // Line of sight along the orbital tangent, both directions.
        let toward = sample(pos, Vec3::new(0.0, 0.0, -1.0), 0.0, 0, 0.8, 0.05, false, true);
        let away = sample(pos, Vec3::new(0.0, 0.0, 1.0), 0.0, 0, 0.8, 0.05, false, true);
        assert_eq!(toward.opacity, away.opacity);
        assert_eq!(toward.color, away.color);
    }

    #[test]
    fn approaching_side_is_brighter_with_doppler() {
        let pos = Vec3::new(DISK_INNER_RADIUS * 1.5, 0.0, 0.0);
        // Tangent at azimuth 0 is +z, so a ray traveling -z views the
        // material head-on.
        let approaching = sample(pos, Vec3::new(0.0, 0.0, -1.0), 0.0, 0, 0.8, 0.05, true, false);
        let receding = sample(pos, Vec3::new(0.0, 0.0, 1.0), 0.0, 0, 0.8, 0.05, true, false);
        assert!(approaching.opacity > receding.opacity);
    }

    #[test]
    fn redshift_dims_the_emission() {
        let with = sample_at(DISK_INNER_RADIUS * 1.2, 0, false, true);
        let without = sample_at(DISK_INNER_RADIUS * 1.2, 0, false, false);
        assert!(with.opacity < without.opacity);
    }

    #[test]
    fn opacity_scales_with_vertical_weight() {
        let pos = Vec3::new(DISK_INNER_RADIUS * 1.5, 0.0, 0.0);
        let dir = Vec3::new(0.0, -1.0, 0.0);
        let thick = sample(pos, dir, 0.0, 0, 1.0, 0.05, false, false);
        let thin = sample(pos, dir, 0.0, 0, 0.1, 0.05, false, false);
        assert!(thick.opacity > thin.opacity);
    }

    #[test]
    fn temperature_falls_off_with_radius() {
        // Compare the pure radial term the ramp is driven by.
        let hot = (DISK_INNER_RADIUS / (DISK_INNER_RADIUS * 1.01)).powf(0.85);
        let cool = (DISK_INNER_RADIUS / (DISK_OUTER_RADIUS * 0.99)).powf(0.85);
        assert!(hot > cool);
    }

    #[test]
    fn color_ramp_hits_its_stops() {
        assert_eq!(color_ramp(0.0), RAMP_COLORS[0]);
        assert_eq!(color_ramp(2.0), RAMP_COLORS[3]);
        assert_eq!(color_ramp(5.0), RAMP_COLORS[3]);
        let mid = color_ramp(0.5);
        assert!((mid - RAMP_COLORS[1]).length() < 1e-5);
    }

    #[test]
    fn color_ramp_is_continuous_at_stops() {
        for stop in [0.5_f32, 1.0] {
            let below = color_ramp(stop - 1e-4);
            let above = color_ramp(stop + 1e-4);
            assert!((below - above).length() < 1e-2);
        }
    }

    #[test]
    fn scale_height_flares_outward() {
        assert!(scale_height(DISK_OUTER_RADIUS) > scale_height(DISK_INNER_RADIUS));
        let mid = scale_height((DISK_INNER_RADIUS + DISK_OUTER_RADIUS) * 0.5);
        assert!(mid > scale_height(DISK_INNER_RADIUS) && mid < scale_height(DISK_OUTER_RADIUS));
    }
}
