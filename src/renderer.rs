//! GPU presentation layer. All shading happens on the CPU; this module only
//! owns the surface, uploads the finished frame into a texture each tick and
//! blits it to the swapchain. The frame texture is sRGB so the CPU's
//! gamma-encoded bytes survive the round trip unchanged.

use anyhow::{Context, Result};
use wgpu::*;

#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;
#[cfg(not(target_arch = "wasm32"))]
use winit::window::Window;

pub struct Renderer {
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    blit_pipeline: RenderPipeline,
    blit_bind_group_layout: BindGroupLayout,
    blit_bind_group: BindGroup,
    frame_texture: Texture,
    sampler: Sampler,
    width: u32,
    height: u32,
    render_width: u32,
    render_height: u32,
    #[cfg(not(target_arch = "wasm32"))]
    start_time: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    start_time: f64,
}

impl Renderer {
    #[cfg(target_arch = "wasm32")]
    pub async fn new_from_canvas(
        canvas: &web_sys::HtmlCanvasElement,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        let surface = instance
            .create_surface(SurfaceTarget::Canvas(canvas.clone()))
            .context("failed to create canvas surface")?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter (WebGPU unavailable?)")?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    label: None,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        Ok(Self::init_common(surface, device, queue, &adapter, width, height))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub async fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    required_features: Features::empty(),
                    required_limits: Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    label: None,
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        Ok(Self::init_common(surface, device, queue, &adapter, width, height))
    }

    fn init_common(
        surface: Surface<'static>,
        device: Device,
        queue: Queue,
        adapter: &Adapter,
        width: u32,
        height: u32,
    ) -> Self {
        let info = adapter.get_info();
        log::info!("adapter: {} ({:?})", info.name, info.backend);

        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let frame_texture = Self::create_frame_texture(&device, width, height);

        let sampler = device.create_sampler(&SamplerDescriptor {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        let blit_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let blit_bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let blit_bind_group =
            Self::create_blit_bind_group(&device, &blit_bind_group_layout, &frame_texture, &sampler);

        let blit_pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_bind_group_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: VertexState {
                module: &blit_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: &blit_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            surface,
            device,
            queue,
            config,
            blit_pipeline,
            blit_bind_group_layout,
            blit_bind_group,
            frame_texture,
            sampler,
            width,
            height,
            render_width: width,
            render_height: height,
            #[cfg(not(target_arch = "wasm32"))]
            start_time: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            start_time: web_sys::window().unwrap().performance().unwrap().now() / 1000.0,
        }
    }

    fn create_frame_texture(device: &Device, width: u32, height: u32) -> Texture {
        device.create_texture(&TextureDescriptor {
            label: Some("Frame Texture"),
            size: Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    }

    fn create_blit_bind_group(
        device: &Device,
        layout: &BindGroupLayout,
        frame_texture: &Texture,
        sampler: &Sampler,
    ) -> BindGroup {
        let view = frame_texture.create_view(&TextureViewDescriptor::default());
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: BindingResource::TextureView(&view) },
                BindGroupEntry { binding: 1, resource: BindingResource::Sampler(sampler) },
            ],
        })
    }

    /// Dimensions the CPU shading pass should render at. Tracks the window
    /// size scaled by the resolution factor given to `resize`.
    pub fn render_size(&self) -> (u32, u32) {
        (self.render_width, self.render_height)
    }

    /// Current surface (window/canvas) size in physical pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Seconds since the renderer came up, shared clock for animation.
    pub fn elapsed(&self) -> f32 {
        #[cfg(not(target_arch = "wasm32"))]
        return self.start_time.elapsed().as_secs_f32();
        #[cfg(target_arch = "wasm32")]
        return (web_sys::window().unwrap().performance().unwrap().now() / 1000.0
            - self.start_time) as f32;
    }

    pub fn resize(&mut self, width: u32, height: u32, resolution_scale: f32) {
        if width == 0 || height == 0 {
            return;
        }

        self.width = width;
        self.height = height;
        self.render_width = ((width as f32) * resolution_scale).max(1.0) as u32;
        self.render_height = ((height as f32) * resolution_scale).max(1.0) as u32;

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        self.frame_texture =
            Self::create_frame_texture(&self.device, self.render_width, self.render_height);
        self.blit_bind_group = Self::create_blit_bind_group(
            &self.device,
            &self.blit_bind_group_layout,
            &self.frame_texture,
            &self.sampler,
        );
    }

    /// Upload one shaded frame (row-major RGBA8 words, `render_size` many)
    /// and present it scaled to the full surface.
    pub fn present_frame(&mut self, pixels: &[u32]) -> Result<(), SurfaceError> {
        debug_assert_eq!(pixels.len(), (self.render_width * self.render_height) as usize);

        self.queue.write_texture(
            ImageCopyTexture {
                texture: &self.frame_texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            bytemuck::cast_slice(pixels),
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.render_width),
                rows_per_image: Some(self.render_height),
            },
            Extent3d {
                width: self.render_width,
                height: self.render_height,
                depth_or_array_layers: 1,
            },
        );

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some("Blit Encoder") });

        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations { load: LoadOp::Clear(Color::BLACK), store: StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.blit_pipeline);
            render_pass.set_bind_group(0, &self.blit_bind_group, &[]);
            render_pass.draw(0..6, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
