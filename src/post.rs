//! Fixed post-processing chain applied to every shaded pixel. Order matters;
//! each stage feeds the next: bloom, exposure, tone-map, gamma, grade,
//! contrast, vignette, grain, clamp.

use glam::{Vec2, Vec3};

use crate::noise::{hash31, smoothstep};

const EXPOSURE: f32 = 1.15;
const BLOOM_SOFT_GAIN: f32 = 0.35;
const BLOOM_HOT_GAIN: f32 = 0.25;
const GRADE: Vec3 = Vec3::new(1.04, 0.99, 0.94);
const CONTRAST_MIX: f32 = 0.35;
const VIGNETTE_STRENGTH: f32 = 0.32;
const GRAIN_AMPLITUDE: f32 = 0.035;

fn luminance(c: Vec3) -> f32 {
    c.x * 0.2126 + c.y * 0.7152 + c.z * 0.0722
}

/// Dual-threshold bloom gain: a soft lift for anything moderately bright
/// and an extra push for genuinely hot pixels.
fn bloom_gain(lum: f32) -> f32 {
    1.0 + smoothstep(0.6, 2.2, lum) * BLOOM_SOFT_GAIN + smoothstep(2.5, 6.0, lum) * BLOOM_HOT_GAIN
}

/// ACES filmic curve, rational polynomial fit.
fn aces(c: Vec3) -> Vec3 {
    let num = c * (2.51 * c + Vec3::splat(0.03));
    let den = c * (2.43 * c + Vec3::splat(0.59)) + Vec3::splat(0.14);
    (num / den).clamp(Vec3::ZERO, Vec3::ONE)
}

/// Run the whole chain for one pixel. `uv` is in [0,1]^2 with (0,0) at the
/// top-left corner of the image.
pub fn process(color: Vec3, uv: Vec2, time: f32) -> Vec3 {
    let mut c = color * bloom_gain(luminance(color));

    c = aces(c * EXPOSURE);
    c = c.powf(1.0 / 2.2);
    c *= GRADE;

    // Per-channel S-curve, mixed in rather than applied outright.
    let curved = c * c * (Vec3::splat(3.0) - 2.0 * c);
    c = c.lerp(curved, CONTRAST_MIX);

    let d = (uv - Vec2::splat(0.5)).length() * std::f32::consts::SQRT_2;
    c *= 1.0 - VIGNETTE_STRENGTH * d.powf(2.4);

    let lum = luminance(c);
    let grain = (hash31(Vec3::new(uv.x * 1920.0, uv.y * 1080.0, time * 47.0)) - 0.5)
        * GRAIN_AMPLITUDE
        * (1.0 - smoothstep(0.0, 0.8, lum));
    c += Vec3::splat(grain);

    c.max(Vec3::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_curve_is_monotone_and_bounded() {
        let mut last = -1.0_f32;
        for i in 0..100 {
            let x = i as f32 * 0.1;
            let y = aces(Vec3::splat(x)).x;
            assert!(y >= last);
            assert!((0.0..=1.0).contains(&y));
            last = y;
        }
    }

    #[test]
    fn output_is_never_negative() {
        let cases = [
            Vec3::splat(-0.5),
            Vec3::ZERO,
            Vec3::new(0.01, 0.0, 0.2),
            Vec3::splat(9.0),
        ];
        for c in cases {
            let out = process(c, Vec2::new(0.8, 0.2), 1.7);
            assert!(out.min_element() >= 0.0, "negative channel for input {c:?}");
        }
    }

    #[test]
    fn vignette_darkens_corners() {
        let c = Vec3::splat(2.0);
        let center = process(c, Vec2::splat(0.5), 0.0);
        let corner = process(c, Vec2::new(0.01, 0.01), 0.0);
        assert!(luminance(center) > luminance(corner));
    }

    #[test]
    fn bloom_prefers_hot_pixels() {
        assert!(bloom_gain(3.0) > bloom_gain(0.5));
        assert!((bloom_gain(0.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn grain_changes_with_time() {
        let c = Vec3::splat(0.1);
        let uv = Vec2::new(0.3, 0.6);
        assert!(process(c, uv, 0.0) != process(c, uv, 0.5));
    }
}
