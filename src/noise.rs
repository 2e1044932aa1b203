//! Deterministic hash and value-noise primitives shared by every procedural
//! layer. Hash path is arithmetic only (fract/dot), no trig.

use glam::{Vec2, Vec3};

#[inline]
fn fract(x: f32) -> f32 {
    x - x.floor()
}

#[inline]
fn fract3(v: Vec3) -> Vec3 {
    v - v.floor()
}

/// Scalar key to [0,1).
#[inline]
pub fn hash11(x: f32) -> f32 {
    let mut p = fract(x * 0.1031);
    p *= p + 33.33;
    p *= p + p;
    fract(p)
}

/// 2D key to [0,1).
#[inline]
pub fn hash21(p: Vec2) -> f32 {
    let mut p3 = fract3(Vec3::new(p.x, p.y, p.x) * 0.1031);
    p3 += Vec3::splat(p3.dot(Vec3::new(p3.y, p3.z, p3.x) + Vec3::splat(33.33)));
    fract((p3.x + p3.y) * p3.z)
}

/// 3D key to [0,1).
#[inline]
pub fn hash31(p: Vec3) -> f32 {
    let mut p3 = fract3(p * 0.1031);
    p3 += Vec3::splat(p3.dot(Vec3::new(p3.z, p3.y, p3.x) + Vec3::splat(31.32)));
    fract((p3.x + p3.y) * p3.z)
}

/// 3D value noise: Hermite-smoothed trilinear blend of the 8 lattice-corner
/// hashes. Output approximately spans [0,1).
pub fn noise3(p: Vec3) -> f32 {
    let i = p.floor();
    let f = p - i;
    let u = f * f * (3.0 - 2.0 * f);

    let n000 = hash31(i);
    let n100 = hash31(i + Vec3::new(1.0, 0.0, 0.0));
    let n010 = hash31(i + Vec3::new(0.0, 1.0, 0.0));
    let n110 = hash31(i + Vec3::new(1.0, 1.0, 0.0));
    let n001 = hash31(i + Vec3::new(0.0, 0.0, 1.0));
    let n101 = hash31(i + Vec3::new(1.0, 0.0, 1.0));
    let n011 = hash31(i + Vec3::new(0.0, 1.0, 1.0));
    let n111 = hash31(i + Vec3::new(1.0, 1.0, 1.0));

    let nx00 = n000 + (n100 - n000) * u.x;
    let nx10 = n010 + (n110 - n010) * u.x;
    let nx01 = n001 + (n101 - n001) * u.x;
    let nx11 = n011 + (n111 - n011) * u.x;
    let nxy0 = nx00 + (nx10 - nx00) * u.y;
    let nxy1 = nx01 + (nx11 - nx01) * u.y;
    nxy0 + (nxy1 - nxy0) * u.z
}

const FBM_NORM: f32 = 1.0 / 0.75;

/// Two-octave fbm, weights 0.5 and 0.25, renormalized so the output
/// approximately spans [0,1).
pub fn fbm(p: Vec3) -> f32 {
    (0.5 * noise3(p) + 0.25 * noise3(p * 2.0)) * FBM_NORM
}

/// Hermite step between two edges, clamped outside.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
