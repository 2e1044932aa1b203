//! Real-time black hole renderer: CPU ray marching around a Schwarzschild
//! hole with a volumetric accretion disk, presented through wgpu on native
//! windows and in the browser.

pub mod audio;
pub mod camera;
pub mod disk;
pub mod gravity;
pub mod integrator;
pub mod noise;
pub mod post;
pub mod render;
pub mod renderer;
pub mod starfield;

#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;

use wgpu::SurfaceError;

use crate::camera::OrbitCamera;
use crate::render::FrameContext;
use crate::renderer::Renderer;

#[cfg(target_arch = "wasm32")]
use crate::audio::{AudioEngine, AudioGraph};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;

/// Render toggles shared by every frontend. The interactive builds re-read
/// these each frame; the offline renderer sets them once from the CLI.
#[derive(Clone, Copy)]
pub struct SimParams {
    pub doppler: bool,
    pub redshift: bool,
    pub resolution_scale: f32,
    pub max_steps: u32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            doppler: true,
            redshift: true,
            resolution_scale: 0.35,
            max_steps: integrator::DEFAULT_MAX_STEPS,
        }
    }
}

#[cfg(target_arch = "wasm32")]
struct AppState {
    renderer: Option<Renderer>,
    camera: OrbitCamera,
    params: SimParams,
    frame: Vec<u32>,
    applied_scale: f32,
    audio_engine: AudioEngine,
    audio_graph: Option<AudioGraph>,
    audio_muted: bool,
    last_frame_time: f64,
    mouse_pressed: bool,
    last_mouse_x: f32,
    last_mouse_y: f32,
    last_touch: Option<(f32, f32)>,
    last_pinch: Option<f32>,
}

#[cfg(target_arch = "wasm32")]
impl AppState {
    fn new() -> Self {
        let camera = OrbitCamera::default();
        let params = SimParams::default();
        Self {
            renderer: None,
            camera,
            params,
            frame: Vec::new(),
            applied_scale: params.resolution_scale,
            audio_engine: AudioEngine::new(camera.distance),
            audio_graph: None,
            audio_muted: false,
            last_frame_time: 0.0,
            mouse_pressed: false,
            last_mouse_x: 0.0,
            last_mouse_y: 0.0,
            last_touch: None,
            last_pinch: None,
        }
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static APP_STATE: RefCell<AppState> = RefCell::new(AppState::new());
}

#[cfg(target_arch = "wasm32")]
fn read_ui_params() -> SimParams {
    let defaults = SimParams::default();
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return defaults;
    };

    let checkbox = |id: &str, fallback: bool| {
        document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<web_sys::HtmlInputElement>().ok())
            .map(|input| input.checked())
            .unwrap_or(fallback)
    };

    let doppler = checkbox("doppler-toggle", defaults.doppler);
    let redshift = checkbox("redshift-toggle", defaults.redshift);

    let resolution_scale = document
        .get_element_by_id("resolution-slider")
        .and_then(|el| el.dyn_into::<web_sys::HtmlInputElement>().ok())
        .map(|input| input.value().parse::<f32>().unwrap_or(defaults.resolution_scale))
        .unwrap_or(defaults.resolution_scale)
        .clamp(0.1, 1.0);

    SimParams { doppler, redshift, resolution_scale, max_steps: defaults.max_steps }
}

#[cfg(target_arch = "wasm32")]
fn render_frame() {
    APP_STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.params = read_ui_params();
        // Camera easing runs exactly once per frame, before rays are built.
        state.camera.update();

        let AppState {
            renderer,
            camera,
            params,
            frame,
            applied_scale,
            audio_engine,
            audio_graph,
            last_frame_time,
            ..
        } = &mut *state;
        let Some(renderer) = renderer.as_mut() else {
            return;
        };

        if (params.resolution_scale - *applied_scale).abs() > 1e-3 {
            let (w, h) = renderer.surface_size();
            renderer.resize(w, h, params.resolution_scale);
            *applied_scale = params.resolution_scale;
        }

        let (rw, rh) = renderer.render_size();
        if rw == 0 || rh == 0 {
            return;
        }
        let ctx = FrameContext::new(camera, rw, rh, renderer.elapsed(), params);
        frame.resize((rw * rh) as usize, 0);
        render::render_into(&ctx, frame);

        match renderer.present_frame(frame) {
            Ok(()) => {}
            Err(SurfaceError::Lost) | Err(SurfaceError::Outdated) => {
                let (w, h) = renderer.surface_size();
                renderer.resize(w, h, params.resolution_scale);
            }
            Err(e) => log::error!("render error: {:?}", e),
        }

        // One-way handoff to the audio side: it only ever learns the camera
        // distance, never reaches back into render state.
        let now = web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now() / 1000.0)
            .unwrap_or(*last_frame_time);
        let dt = (now - *last_frame_time).max(0.0) as f32;
        *last_frame_time = now;
        audio_engine.set_distance(camera.distance);
        audio_engine.advance(dt);
        if let Some(graph) = audio_graph.as_ref() {
            graph.apply(&audio_engine.params());
            if let Some(pulse) = audio_engine.next_pulse(graph.current_time()) {
                if let Err(e) = graph.pulse(&pulse) {
                    log::warn!("pulse playback failed: {:?}", e);
                }
            }
        }
    });
}

#[cfg(target_arch = "wasm32")]
fn request_animation_frame(f: &Closure<dyn FnMut()>) {
    web_sys::window()
        .unwrap()
        .request_animation_frame(f.as_ref().unchecked_ref())
        .unwrap();
}

#[cfg(target_arch = "wasm32")]
fn start_render_loop() {
    let f = Rc::new(RefCell::new(None));
    let g = f.clone();

    *g.borrow_mut() = Some(Closure::new(move || {
        render_frame();
        request_animation_frame(f.borrow().as_ref().unwrap());
    }));

    request_animation_frame(g.borrow().as_ref().unwrap());
}

#[cfg(target_arch = "wasm32")]
fn setup_event_listeners(canvas: &web_sys::HtmlCanvasElement) {
    {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::MouseEvent| {
            if event.button() == 0 {
                APP_STATE.with(|state| {
                    let mut state = state.borrow_mut();
                    state.mouse_pressed = true;
                    state.last_mouse_x = event.client_x() as f32;
                    state.last_mouse_y = event.client_y() as f32;
                });
            }
        });
        canvas
            .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    {
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
            APP_STATE.with(|state| {
                state.borrow_mut().mouse_pressed = false;
            });
        });
        web_sys::window()
            .unwrap()
            .add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::MouseEvent| {
            APP_STATE.with(|state| {
                let mut state = state.borrow_mut();
                if state.mouse_pressed {
                    let x = event.client_x() as f32;
                    let y = event.client_y() as f32;
                    let dx = x - state.last_mouse_x;
                    let dy = y - state.last_mouse_y;
                    state.camera.orbit(dx, dy);
                    state.last_mouse_x = x;
                    state.last_mouse_y = y;
                }
            });
        });
        canvas
            .add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::WheelEvent| {
            event.prevent_default();
            APP_STATE.with(|state| {
                let notches = -(event.delta_y() as f32) / 100.0;
                state.borrow_mut().camera.zoom(notches);
            });
        });
        canvas
            .add_event_listener_with_callback("wheel", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::TouchEvent| {
            let touches = event.touches();
            APP_STATE.with(|state| {
                let mut state = state.borrow_mut();
                if touches.length() == 1 {
                    if let Some(t) = touches.get(0) {
                        state.last_touch = Some((t.client_x() as f32, t.client_y() as f32));
                    }
                    state.last_pinch = None;
                } else if touches.length() == 2 {
                    if let (Some(a), Some(b)) = (touches.get(0), touches.get(1)) {
                        let dx = (a.client_x() - b.client_x()) as f32;
                        let dy = (a.client_y() - b.client_y()) as f32;
                        state.last_pinch = Some((dx * dx + dy * dy).sqrt());
                    }
                    state.last_touch = None;
                }
            });
        });
        canvas
            .add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::TouchEvent| {
            event.prevent_default();
            let touches = event.touches();
            APP_STATE.with(|state| {
                let mut state = state.borrow_mut();
                if touches.length() == 1 {
                    if let Some(t) = touches.get(0) {
                        let x = t.client_x() as f32;
                        let y = t.client_y() as f32;
                        if let Some((lx, ly)) = state.last_touch {
                            state.camera.orbit(x - lx, y - ly);
                        }
                        state.last_touch = Some((x, y));
                    }
                } else if touches.length() == 2 {
                    if let (Some(a), Some(b)) = (touches.get(0), touches.get(1)) {
                        let dx = (a.client_x() - b.client_x()) as f32;
                        let dy = (a.client_y() - b.client_y()) as f32;
                        let dist = (dx * dx + dy * dy).sqrt();
                        if let Some(last) = state.last_pinch {
                            if last > 0.0 {
                                state.camera.pinch(dist / last);
                            }
                        }
                        state.last_pinch = Some(dist);
                    }
                }
            });
        });
        canvas
            .add_event_listener_with_callback("touchmove", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    {
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::TouchEvent| {
            APP_STATE.with(|state| {
                let mut state = state.borrow_mut();
                state.last_touch = None;
                state.last_pinch = None;
            });
        });
        canvas
            .add_event_listener_with_callback("touchend", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }

    // Audio needs a user gesture; the first click builds and resumes the
    // output graph, later clicks fade it in and out.
    {
        let closure = Closure::<dyn FnMut()>::new(move || {
            APP_STATE.with(|state| {
                let mut state = state.borrow_mut();
                if state.audio_graph.is_none() {
                    match AudioGraph::new() {
                        Ok(graph) => {
                            graph.resume();
                            state.audio_graph = Some(graph);
                            state.audio_muted = false;
                            log::info!("audio graph started");
                        }
                        Err(e) => log::error!("audio init failed: {:?}", e),
                    }
                    return;
                }
                state.audio_muted = !state.audio_muted;
                let muted = state.audio_muted;
                if let Some(graph) = &state.audio_graph {
                    if !muted {
                        graph.resume();
                    }
                    graph.set_muted(muted);
                }
            });
        });
        if let Some(document) = web_sys::window().and_then(|w| w.document()) {
            if let Some(button) = document.get_element_by_id("audio-toggle") {
                button
                    .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
                    .unwrap();
                closure.forget();
            }
        }
    }

    {
        let closure = Closure::<dyn FnMut()>::new(move || {
            APP_STATE.with(|state| {
                let mut state = state.borrow_mut();
                let scale = state.params.resolution_scale;
                let Some(renderer) = state.renderer.as_mut() else {
                    return;
                };
                let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                    return;
                };
                let Some(container) = document.get_element_by_id("container") else {
                    return;
                };
                let width = container.client_width().max(1) as u32;
                let height = container.client_height().max(1) as u32;
                if let Some(canvas) = document
                    .get_element_by_id("canvas")
                    .and_then(|el| el.dyn_into::<web_sys::HtmlCanvasElement>().ok())
                {
                    canvas.set_width(width);
                    canvas.set_height(height);
                }
                renderer.resize(width, height, scale);
            });
        });
        web_sys::window()
            .unwrap()
            .add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())
            .unwrap();
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn run() -> Result<(), JsValue> {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
    console_log::init_with_level(log::Level::Info).expect("couldn't initialize logger");

    log::info!("starting black hole renderer");

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
    let canvas = document
        .get_element_by_id("canvas")
        .ok_or_else(|| JsValue::from_str("canvas element missing"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()?;

    let container = document
        .get_element_by_id("container")
        .ok_or_else(|| JsValue::from_str("container element missing"))?;
    let width = container.client_width().max(1) as u32;
    let height = container.client_height().max(1) as u32;
    canvas.set_width(width);
    canvas.set_height(height);

    log::info!("canvas size: {}x{}", width, height);

    let mut renderer = match Renderer::new_from_canvas(&canvas, width, height).await {
        Ok(renderer) => renderer,
        Err(e) => {
            let message = format!("initialization failed: {e:#}");
            log::error!("{message}");
            if let Some(loading) = document.get_element_by_id("loading") {
                loading.set_text_content(Some(&message));
            }
            return Err(JsValue::from_str(&message));
        }
    };
    let scale = SimParams::default().resolution_scale;
    renderer.resize(width, height, scale);

    APP_STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.renderer = Some(renderer);
        state.applied_scale = scale;
    });

    if let Some(loading) = document.get_element_by_id("loading") {
        let _ = loading.set_attribute("style", "display: none");
    }

    setup_event_listeners(&canvas);
    start_render_loop();

    log::info!("render loop started");
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run() -> anyhow::Result<()> {
    use winit::{
        application::ApplicationHandler,
        dpi::LogicalSize,
        event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
        event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
        window::{Window, WindowId},
    };

    struct App {
        window: Option<Arc<Window>>,
        renderer: Option<Renderer>,
        camera: OrbitCamera,
        params: SimParams,
        frame: Vec<u32>,
        mouse_pressed: bool,
        last_mouse_pos: Option<(f64, f64)>,
        error: Option<anyhow::Error>,
    }

    impl App {
        fn new() -> Self {
            Self {
                window: None,
                renderer: None,
                camera: OrbitCamera::default(),
                params: SimParams::default(),
                frame: Vec::new(),
                mouse_pressed: false,
                last_mouse_pos: None,
                error: None,
            }
        }

        fn draw_frame(&mut self, event_loop: &ActiveEventLoop) {
            let Some(renderer) = &mut self.renderer else {
                return;
            };
            self.camera.update();

            let (rw, rh) = renderer.render_size();
            if rw == 0 || rh == 0 {
                return;
            }
            let ctx = FrameContext::new(&self.camera, rw, rh, renderer.elapsed(), &self.params);
            self.frame.resize((rw * rh) as usize, 0);
            render::render_into(&ctx, &mut self.frame);

            match renderer.present_frame(&self.frame) {
                Ok(()) => {}
                Err(SurfaceError::Lost) | Err(SurfaceError::Outdated) => {
                    let (w, h) = renderer.surface_size();
                    renderer.resize(w, h, self.params.resolution_scale);
                }
                Err(SurfaceError::OutOfMemory) => {
                    log::error!("surface out of memory, shutting down");
                    event_loop.exit();
                }
                Err(e) => log::warn!("surface error: {:?}", e),
            }
        }
    }

    impl ApplicationHandler for App {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.window.is_some() {
                return;
            }

            let window_attrs = Window::default_attributes()
                .with_title("Accretion")
                .with_inner_size(LogicalSize::new(1280, 720));

            let window = match event_loop.create_window(window_attrs) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    self.error = Some(anyhow::Error::new(e).context("failed to create window"));
                    event_loop.exit();
                    return;
                }
            };
            let size = window.inner_size();
            match pollster::block_on(Renderer::new(window.clone(), size.width, size.height)) {
                Ok(mut renderer) => {
                    renderer.resize(size.width, size.height, self.params.resolution_scale);
                    self.window = Some(window);
                    self.renderer = Some(renderer);
                    log::info!("renderer up at {}x{}", size.width, size.height);
                }
                Err(e) => {
                    self.error = Some(e);
                    event_loop.exit();
                }
            }
        }

        fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
            match event {
                WindowEvent::CloseRequested => event_loop.exit(),
                WindowEvent::Resized(size) => {
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(size.width, size.height, self.params.resolution_scale);
                    }
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    if button == MouseButton::Left {
                        self.mouse_pressed = state == ElementState::Pressed;
                        if !self.mouse_pressed {
                            self.last_mouse_pos = None;
                        }
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    if self.mouse_pressed {
                        if let Some((lx, ly)) = self.last_mouse_pos {
                            let dx = (position.x - lx) as f32;
                            let dy = (position.y - ly) as f32;
                            self.camera.orbit(dx, dy);
                        }
                        self.last_mouse_pos = Some((position.x, position.y));
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let notches = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                    };
                    self.camera.zoom(notches);
                }
                WindowEvent::RedrawRequested => self.draw_frame(event_loop),
                _ => {}
            }
        }

        fn about_to_wait(&mut self, _: &ActiveEventLoop) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new();
    event_loop.run_app(&mut app)?;
    if let Some(e) = app.error.take() {
        return Err(e);
    }
    Ok(())
}
