//! Application state holding the wgpu graphics context
//!
//! Owns the device, surface and egui integration, plus the scene, the mode
//! controller and the perception adapter. Everything here runs on the
//! event-loop thread.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::gesture::orientation::SceneOrientation;
use crate::gesture::{AppMode, ModeController};
use crate::perception::PerceptionAdapter;
use crate::render::Renderer;
use crate::scene::{Scene, SceneTextures};
use crate::settings::Settings;
use crate::textures::loader::PhotoLoader;
use crate::textures::{self, CANDY_SIZE, CARD_SIZE};
use crate::ui::{self, OverlayActions, OverlayState};

/// Errors that stop the app from starting
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,
}

/// Main application state
pub struct App {
    /// Reference to the window
    window: Arc<Window>,
    /// The wgpu surface for presenting rendered frames
    surface: wgpu::Surface<'static>,
    /// The wgpu device for creating GPU resources
    device: wgpu::Device,
    /// The command queue for submitting GPU work
    queue: wgpu::Queue,
    /// Surface configuration
    config: wgpu::SurfaceConfiguration,
    /// Current window size in physical pixels
    size: PhysicalSize<u32>,

    settings: Settings,

    // Scene
    scene: Scene,
    renderer: Renderer,
    controller: ModeController,
    orientation: SceneOrientation,
    perception: PerceptionAdapter,
    photos: PhotoLoader,

    // egui integration
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    ui_visible: bool,

    // Frame timing
    start: Instant,
    frame_count: u64,
    fps: f64,
    last_fps_update: Instant,
    frames_since_update: u64,
}

impl App {
    /// Create a new App instance with initialized wgpu context
    pub async fn new(window: Arc<Window>, settings: Settings) -> Result<Self, AppError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(AppError::NoAdapter)?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Gesture Tree Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(AppError::NoSurfaceFormat)?;

        log::info!("Surface format: {:?}", surface_format);

        let present_mode = if surface_caps
            .present_modes
            .contains(&wgpu::PresentMode::Immediate)
        {
            wgpu::PresentMode::Immediate
        } else if surface_caps
            .present_modes
            .contains(&wgpu::PresentMode::Mailbox)
        {
            wgpu::PresentMode::Mailbox
        } else {
            wgpu::PresentMode::Fifo
        };

        log::info!("Present mode: {:?}", present_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };

        surface.configure(&device, &config);

        let mut renderer = Renderer::new(
            &device,
            &queue,
            surface_format,
            config.width,
            config.height,
            &settings.render,
        );

        let candy = match textures::candy_stripes(CANDY_SIZE) {
            Ok(image) => Some(renderer.add_texture(&device, &queue, &image, "Candy Stripes")),
            Err(e) => {
                log::warn!("Candy texture unavailable: {}", e);
                None
            }
        };
        let default_photo = match textures::photo_card(CARD_SIZE, &settings.scene.default_caption) {
            Ok(image) => Some(renderer.add_texture(&device, &queue, &image, "Default Photo")),
            Err(e) => {
                log::warn!("Default photo unavailable: {}", e);
                None
            }
        };

        let scene = Scene::new(&settings.scene, SceneTextures { candy, default_photo });
        log::info!(
            "Scene ready: {} particles, {} photos",
            scene.particle_count(),
            scene.photo_count()
        );

        let controller = ModeController::new(settings.gestures);
        let perception = PerceptionAdapter::start(&settings.perception);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        ui::install_style(&egui_ctx);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        let now = Instant::now();

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            settings,
            scene,
            renderer,
            controller,
            orientation: SceneOrientation::default(),
            perception,
            photos: PhotoLoader::new(),
            egui_ctx,
            egui_state,
            egui_renderer,
            ui_visible: true,
            start: now,
            frame_count: 0,
            fps: 0.0,
            last_fps_update: now,
            frames_since_update: 0,
        })
    }

    /// Handle a window event, returning true if egui consumed it
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    /// Resize the surface and size-dependent render targets
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.renderer.resize(&self.device, new_size.width, new_size.height);
        }
    }

    /// Get current size
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Show or hide the overlay
    pub fn toggle_ui(&mut self) {
        self.ui_visible = !self.ui_visible;
        log::info!("Overlay visible: {}", self.ui_visible);
    }

    /// Switch mode from a key or button, bypassing gestures
    pub fn force_mode(&mut self, mode: AppMode) {
        if let Some(mode) = self.controller.force(mode) {
            log::info!("Mode: {}", mode.display_name());
        }
    }

    /// Open the photo picker in the background. The photo joins the scene
    /// on the frame after it finishes decoding.
    pub fn open_photo_dialog(&mut self) {
        self.photos.request();
    }

    /// Acquire the next surface texture, then advance and draw one frame.
    /// Nothing is simulated when no texture is available.
    pub fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        run_frame(
            self,
            |app| app.surface.get_current_texture(),
            App::update,
            App::render,
        )
    }

    /// Per-frame simulation: photos, gestures, orientation, then particles
    fn update(&mut self) {
        while let Some(photo) = self.photos.poll() {
            let texture = self
                .renderer
                .add_texture(&self.device, &self.queue, &photo.image, &photo.name);
            let id = self.scene.add_photo(texture);
            log::info!("Added photo {} from {}", id, photo.name);
        }

        let observation = self.perception.poll();

        if let Some(mode) = self.controller.update(observation.as_ref()) {
            log::info!("Mode: {}", mode.display_name());
        }
        self.orientation
            .update(observation.as_ref(), &self.settings.gestures);

        let time = self.start.elapsed().as_secs_f32();
        self.scene.step(self.controller.mode(), time);
    }

    fn render(&mut self, output: wgpu::SurfaceTexture) {
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        self.renderer.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &view,
            self.scene.registry().as_slice(),
            self.orientation.matrix(),
        );

        let actions = self.render_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.update_fps();

        if let Some(mode) = actions.force_mode {
            self.force_mode(mode);
        }
        if actions.add_photo {
            self.open_photo_dialog();
        }
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) -> OverlayActions {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        let state = OverlayState {
            visible: self.ui_visible,
            mode: self.controller.mode(),
            fps: self.fps,
            particle_count: self.scene.particle_count(),
            photo_count: self.scene.photo_count(),
            perception: self.perception.status().display_name(),
            photo_busy: self.photos.is_busy(),
        };

        let mut actions = OverlayActions::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            actions = ui::draw_overlay(ctx, &state);
        });

        self.egui_state.handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self.egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();

            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        actions
    }

    fn update_fps(&mut self) {
        self.frame_count += 1;
        self.frames_since_update += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_fps_update = now;
            log::trace!("Frame {}: {:.1} fps", self.frame_count, self.fps);
        }
    }
}

/// Acquire a frame target, then step and draw. Returns the acquire error
/// without stepping.
fn run_frame<S, T, E>(
    state: &mut S,
    acquire: impl FnOnce(&mut S) -> Result<T, E>,
    step: impl FnOnce(&mut S),
    draw: impl FnOnce(&mut S, T),
) -> Result<(), E> {
    let target = acquire(state)?;
    step(state);
    draw(state, target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counters {
        steps: u32,
        draws: Vec<u32>,
    }

    #[test]
    fn test_failed_acquire_does_not_step() {
        let mut counters = Counters::default();
        let result = run_frame(
            &mut counters,
            |_| Err::<u32, _>(wgpu::SurfaceError::Timeout),
            |c| c.steps += 1,
            |c, target| c.draws.push(target),
        );
        assert!(matches!(result, Err(wgpu::SurfaceError::Timeout)));
        assert_eq!(counters.steps, 0);
        assert!(counters.draws.is_empty());
    }

    #[test]
    fn test_frame_steps_before_drawing() {
        let mut counters = Counters::default();
        run_frame(
            &mut counters,
            |_| Ok::<_, wgpu::SurfaceError>(7),
            |c| c.steps += 1,
            |c, target| c.draws.push(target * 10 + c.steps),
        )
        .unwrap();
        assert_eq!(counters.steps, 1);
        assert_eq!(counters.draws, vec![71]);
    }
}
