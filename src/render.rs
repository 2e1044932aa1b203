//! Frame rendering: builds one immutable context per frame and shades every
//! pixel from it. Rows shade in parallel on native targets; the wasm build
//! walks them sequentially on the main thread.

use glam::{Vec2, Vec3};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use crate::camera::{CameraBasis, OrbitCamera};
use crate::integrator::{self, TraceParams};
use crate::{post, starfield, SimParams};

/// Immutable per-frame inputs. Copyable plain data, so worker threads can
/// read it without any sharing discipline beyond `Sync`.
#[derive(Clone, Copy)]
pub struct FrameContext {
    pub width: u32,
    pub height: u32,
    pub camera: CameraBasis,
    pub trace: TraceParams,
}

impl FrameContext {
    pub fn new(camera: &OrbitCamera, width: u32, height: u32, time: f32, params: &SimParams) -> Self {
        Self {
            width,
            height,
            camera: camera.basis(),
            trace: TraceParams {
                time,
                doppler: params.doppler,
                redshift: params.redshift,
                max_steps: params.max_steps,
            },
        }
    }

    pub fn time(&self) -> f32 {
        self.trace.time
    }

    fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Linear scene color for one pixel, before post-processing.
pub fn shade_pixel(ctx: &FrameContext, px: u32, py: u32) -> Vec3 {
    let ndc_x = (px as f32 + 0.5) / ctx.width as f32 * 2.0 - 1.0;
    let ndc_y = 1.0 - (py as f32 + 0.5) / ctx.height as f32 * 2.0;
    let dir = ctx.camera.ray_direction(ndc_x, ndc_y, ctx.aspect());
    let result = integrator::trace(ctx.camera.position, dir, &ctx.trace);
    starfield::composite(&result, ctx.time())
}

/// One display-ready pixel, packed RGBA8 with full alpha.
pub fn render_pixel(ctx: &FrameContext, px: u32, py: u32) -> u32 {
    let color = shade_pixel(ctx, px, py);
    let uv = Vec2::new(
        (px as f32 + 0.5) / ctx.width as f32,
        (py as f32 + 0.5) / ctx.height as f32,
    );
    pack_rgba8(post::process(color, uv, ctx.time()))
}

/// Pack a display color into one little-endian RGBA8 word (red in the low
/// byte, alpha forced opaque).
pub fn pack_rgba8(c: Vec3) -> u32 {
    let r = (c.x.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    let g = (c.y.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    let b = (c.z.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    r | (g << 8) | (b << 16) | 0xFF00_0000
}

/// Shade a whole frame into `pixels`, which must hold `width * height`
/// entries in row-major order.
pub fn render_into(ctx: &FrameContext, pixels: &mut [u32]) {
    debug_assert_eq!(pixels.len(), (ctx.width * ctx.height) as usize);

    #[cfg(not(target_arch = "wasm32"))]
    pixels
        .par_chunks_mut(ctx.width as usize)
        .enumerate()
        .for_each(|(py, row)| {
            for (px, out) in row.iter_mut().enumerate() {
                *out = render_pixel(ctx, px as u32, py as u32);
            }
        });

    #[cfg(target_arch = "wasm32")]
    for py in 0..ctx.height {
        for px in 0..ctx.width {
            pixels[(py * ctx.width + px) as usize] = render_pixel(ctx, px, py);
        }
    }
}
