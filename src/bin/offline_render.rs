//! Offline high-quality renderer. Same physics and shading as the
//! interactive build, plus supersampling, driven from the command line and
//! written to a PNG.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use glam::{Vec2, Vec3};
use image::{ImageBuffer, Rgb};
use rayon::prelude::*;

use accretion::camera::OrbitCamera;
use accretion::gravity::{DISK_INNER_RADIUS, DISK_OUTER_RADIUS, SCHWARZSCHILD_RADIUS};
use accretion::noise::hash21;
use accretion::render::FrameContext;
use accretion::{integrator, post, starfield, SimParams};

#[derive(Clone, Copy)]
enum Quality {
    Preview,
    High,
    Ultra,
    Insane,
}

impl Quality {
    /// Side length of the per-pixel jitter grid.
    fn grid(&self) -> u32 {
        match self {
            Quality::Preview => 1,
            Quality::High => 2,
            Quality::Ultra => 4,
            Quality::Insane => 8,
        }
    }

    fn samples_per_pixel(&self) -> u32 {
        self.grid() * self.grid()
    }

    fn name(&self) -> &'static str {
        match self {
            Quality::Preview => "preview",
            Quality::High => "high",
            Quality::Ultra => "ultra",
            Quality::Insane => "insane",
        }
    }
}

#[derive(Clone)]
struct RenderParams {
    width: u32,
    height: u32,
    distance: f32,
    azimuth_deg: f32,
    elevation_deg: f32,
    time: f32,
    quality: Quality,
    max_steps: u32,
    doppler: bool,
    redshift: bool,
    output: Option<String>,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            distance: 35.0,
            azimuth_deg: 180.0,
            elevation_deg: 9.74,
            time: 0.0,
            quality: Quality::High,
            max_steps: integrator::DEFAULT_MAX_STEPS,
            doppler: true,
            redshift: true,
            output: None,
        }
    }
}

fn render_pixel(x: u32, y: u32, ctx: &FrameContext, grid: u32) -> [u8; 3] {
    let aspect = ctx.width as f32 / ctx.height as f32;
    let mut color = Vec3::ZERO;

    for sy in 0..grid {
        for sx in 0..grid {
            let (jx, jy) = if grid > 1 {
                (
                    (sx as f32 + hash21(Vec2::new((x + sx) as f32, (y + sy) as f32))) / grid as f32,
                    (sy as f32 + hash21(Vec2::new((x + sx) as f32 + 100.0, (y + sy) as f32)))
                        / grid as f32,
                )
            } else {
                (0.5, 0.5)
            };

            let ndc_x = ((x as f32 + jx) / ctx.width as f32) * 2.0 - 1.0;
            let ndc_y = 1.0 - ((y as f32 + jy) / ctx.height as f32) * 2.0;
            let dir = ctx.camera.ray_direction(ndc_x, ndc_y, aspect);
            let result = integrator::trace(ctx.camera.position, dir, &ctx.trace);
            color += starfield::composite(&result, ctx.time());
        }
    }

    color /= (grid * grid) as f32;

    let uv = Vec2::new(
        (x as f32 + 0.5) / ctx.width as f32,
        (y as f32 + 0.5) / ctx.height as f32,
    );
    let out = post::process(color, uv, ctx.time());
    [
        (out.x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (out.y.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (out.z.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
    ]
}

fn print_help() {
    println!("Black Hole Offline Renderer");
    println!();
    println!("Usage: offline_render [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -w, --width <WIDTH>      Output width (default: 1920)");
    println!("  -h, --height <HEIGHT>    Output height (default: 1080)");
    println!("  -q, --quality <QUALITY>  preview|high|ultra|insane (default: high)");
    println!("  -d, --distance <DIST>    Camera distance, 10-100 (default: 35)");
    println!("  -a, --azimuth <DEG>      Camera azimuth in degrees (default: 180)");
    println!("  -e, --elevation <DEG>    Camera elevation in degrees (default: 9.74)");
    println!("  -t, --time <SECONDS>     Animation time to render (default: 0)");
    println!("  -n, --steps <STEPS>      Max ray marching steps (default: 400)");
    println!("      --no-doppler         Disable Doppler beaming");
    println!("      --no-redshift        Disable gravitational redshift");
    println!("  -o, --output <FILE>      Output path (default: derived name)");
    println!();
    println!("Quality presets affect samples/pixel:");
    println!("  preview: 1 sample/pixel");
    println!("  high:    4 samples/pixel");
    println!("  ultra:   16 samples/pixel");
    println!("  insane:  64 samples/pixel");
}

fn parse_args(args: &[String]) -> Option<RenderParams> {
    let mut params = RenderParams::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-w" | "--width" => {
                params.width = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(1920);
                i += 1;
            }
            "-h" | "--height" => {
                params.height = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(1080);
                i += 1;
            }
            "-q" | "--quality" => {
                params.quality = match args.get(i + 1).map(|s| s.as_str()) {
                    Some("preview") => Quality::Preview,
                    Some("high") => Quality::High,
                    Some("ultra") => Quality::Ultra,
                    Some("insane") => Quality::Insane,
                    _ => Quality::High,
                };
                i += 1;
            }
            "-d" | "--distance" => {
                params.distance = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(35.0);
                i += 1;
            }
            "-a" | "--azimuth" => {
                params.azimuth_deg = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(180.0);
                i += 1;
            }
            "-e" | "--elevation" => {
                params.elevation_deg = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(9.74);
                i += 1;
            }
            "-t" | "--time" => {
                params.time = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(0.0);
                i += 1;
            }
            "-n" | "--steps" => {
                params.max_steps = args
                    .get(i + 1)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(integrator::DEFAULT_MAX_STEPS);
                i += 1;
            }
            "--no-doppler" => params.doppler = false,
            "--no-redshift" => params.redshift = false,
            "-o" | "--output" => {
                params.output = args.get(i + 1).cloned();
                i += 1;
            }
            "--help" => {
                print_help();
                return None;
            }
            _ => {}
        }
        i += 1;
    }

    Some(params)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(params) = parse_args(&args) else {
        return Ok(());
    };

    let camera = OrbitCamera::with_pose(
        params.azimuth_deg.to_radians(),
        params.elevation_deg.to_radians(),
        params.distance,
    );
    let sim = SimParams {
        doppler: params.doppler,
        redshift: params.redshift,
        resolution_scale: 1.0,
        max_steps: params.max_steps,
    };
    let ctx = FrameContext::new(&camera, params.width, params.height, params.time, &sim);
    let grid = params.quality.grid();

    println!("Black Hole Offline Renderer");
    println!("===========================");
    println!("Resolution: {}x{}", params.width, params.height);
    println!("Samples/pixel: {}", params.quality.samples_per_pixel());
    println!("Max steps: {}", params.max_steps);
    println!(
        "Camera: distance {:.1}, azimuth {:.1} deg, elevation {:.1} deg",
        camera.distance, params.azimuth_deg, params.elevation_deg
    );
    println!(
        "Doppler: {}, redshift: {}",
        if params.doppler { "on" } else { "off" },
        if params.redshift { "on" } else { "off" }
    );
    println!("Schwarzschild radius: {:.1}", SCHWARZSCHILD_RADIUS);
    println!("Disk: {:.1} to {:.1}", DISK_INNER_RADIUS, DISK_OUTER_RADIUS);
    println!();

    let total_pixels = params.width * params.height;
    let progress = Arc::new(AtomicUsize::new(0));

    println!("Rendering...");

    let start = std::time::Instant::now();

    let pixels: Vec<(u32, u32, [u8; 3])> = (0..params.height)
        .into_par_iter()
        .flat_map(|y| {
            let progress = Arc::clone(&progress);
            let ctx = ctx;
            (0..params.width).into_par_iter().map(move |x| {
                let color = render_pixel(x, y, &ctx, grid);

                let prog = progress.fetch_add(1, Ordering::Relaxed);
                if prog % 10000 == 0 {
                    let pct = (prog as f32 / total_pixels as f32 * 100.0) as u32;
                    eprint!("\rProgress: {}%  ", pct);
                }

                (x, y, color)
            })
        })
        .collect();

    eprintln!("\rProgress: 100%  ");

    let mut img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(params.width, params.height);
    for (x, y, color) in pixels {
        img.put_pixel(x, y, Rgb(color));
    }

    let elapsed = start.elapsed();
    println!("Render time: {:.1}s", elapsed.as_secs_f32());

    let filename = params.output.clone().unwrap_or_else(|| {
        format!(
            "blackhole_{}x{}_q{}.png",
            params.width,
            params.height,
            params.quality.name()
        )
    });

    img.save(&filename)
        .with_context(|| format!("failed to save image to {filename}"))?;
    println!("Saved to: {}", filename);

    Ok(())
}
