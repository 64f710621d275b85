//! Window, event loop and frame driver.
//!
//! [`run`] opens the window, builds the configured [`Pipeline`] and hands each
//! frame to the [`Scene`]. Startup failures are logged once with their
//! category and turn into a `-1` exit code.

use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use crate::config::PipelineConfig;
use crate::error::{RenderError, RenderResult};
use crate::input::{FrameContext, InputState};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::renderer::utils::Viewport;
use crate::renderer::{Renderer, SurfaceAction};
use crate::scene::{Scene, SceneAction};
use crate::window::{WindowMode, apply_window_settings, window_attributes};

pub const EXIT_OK: i32 = 0;
pub const EXIT_STARTUP_FAILURE: i32 = -1;

/// Run `scene` through the pipeline described by `config` until the window
/// closes or the scene quits. Returns the process exit code.
pub fn run(config: PipelineConfig, scene: Box<dyn Scene>) -> i32 {
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("[Window] failed to create event loop: {e}");
            return EXIT_STARTUP_FAILURE;
        }
    };
    let mut app = App {
        config,
        scene,
        running: None,
        input: InputState::new(),
        started: Instant::now(),
        last_frame: None,
        frame: 0,
        exit_code: EXIT_OK,
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("[Window] event loop terminated: {e}");
        return EXIT_STARTUP_FAILURE;
    }
    app.exit_code
}

// ── App (winit ApplicationHandler) ──────────────────────────────────────────

/// GPU state that exists once the window is up. The pipeline is declared
/// first so its stages drop before the device.
struct Running {
    pipeline: Pipeline,
    renderer: Renderer,
}

struct App {
    config: PipelineConfig,
    scene: Box<dyn Scene>,
    running: Option<Running>,
    input: InputState,
    started: Instant,
    last_frame: Option<Instant>,
    frame: u64,
    exit_code: i32,
}

impl App {
    fn start(&self, event_loop: &ActiveEventLoop) -> RenderResult<Running> {
        let window = Arc::new(
            event_loop
                .create_window(window_attributes(&self.config.window))
                .map_err(RenderError::window)?,
        );
        let renderer = pollster::block_on(Renderer::new(window, &self.config.window))?;
        let pipeline = PipelineBuilder::new(self.config.clone())
            .with_textures(self.scene.textures())
            .build(renderer.device(), renderer.queue(), renderer.surface_format(), renderer.size())?;
        Ok(Running { pipeline, renderer })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RenderError) {
        self.record_failure("startup", &err);
        event_loop.exit();
    }

    /// Log `err` under its category and make the process exit with a failure code.
    fn record_failure(&mut self, context: &str, err: &RenderError) {
        log::error!("[{}] {} failed: {}", err.category(), context, err);
        self.exit_code = EXIT_STARTUP_FAILURE;
    }

    fn toggle_fullscreen(&mut self) {
        let Some(running) = &self.running else { return };
        self.config.window.mode = match self.config.window.mode {
            WindowMode::Windowed => WindowMode::Borderless,
            WindowMode::Borderless => WindowMode::Windowed,
        };
        apply_window_settings(&running.renderer.window, &self.config.window);
        log::info!("window mode: {:?}", self.config.window.mode);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = self.last_frame.map(|prev| now.duration_since(prev).as_secs_f32().min(0.25)).unwrap_or(0.0);
        self.last_frame = Some(now);
        self.frame += 1;

        let Some(running) = self.running.as_mut() else { return };
        let (width, height) = running.renderer.size();
        let ctx = FrameContext {
            dt,
            elapsed: self.started.elapsed().as_secs_f32(),
            frame: self.frame,
            input: &self.input,
            viewport: Viewport::full(width, height),
        };
        if let SceneAction::Quit = self.scene.update(&ctx) {
            event_loop.exit();
            return;
        }

        let surface = match running.renderer.acquire() {
            Ok(surface) => surface,
            Err(e) => {
                match running.renderer.handle_surface_error(e) {
                    SurfaceAction::Reconfigured | SurfaceAction::SkipFrame => {}
                    SurfaceAction::Fatal => {
                        log::error!("[Surface] out of memory acquiring the swapchain image");
                        event_loop.exit();
                    }
                }
                self.input.clear_frame_state();
                return;
            }
        };
        let view = surface.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let rendered = running.pipeline.render(
            running.renderer.device(),
            running.renderer.queue(),
            self.scene.as_ref(),
            &view,
        );
        if let Err(e) = rendered {
            self.record_failure(&format!("frame {}", self.frame), &e);
            event_loop.exit();
            return;
        }
        running.renderer.window.pre_present_notify();
        surface.present();
        self.input.clear_frame_state();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(running) => {
                let (w, h) = running.renderer.size();
                log::info!("started `{}` at {}x{}", self.config.window.title, w, h);
                self.started = Instant::now();
                self.running = Some(running);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.as_ref() {
            running.renderer.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.running.is_none() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => {
                let Some(running) = self.running.as_mut() else { return };
                if !running.renderer.resize(size) {
                    return;
                }
                if let Err(e) = running.pipeline.resize(running.renderer.device(), size.width, size.height) {
                    self.record_failure(&format!("resize to {}x{}", size.width, size.height), &e);
                    event_loop.exit();
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.input.cursor_moved(position.x as f32, position.y as f32);
            }

            WindowEvent::MouseInput { button, state, .. } => match state {
                ElementState::Pressed => self.input.mouse_down(button),
                ElementState::Released => self.input.mouse_up(button),
            },

            WindowEvent::MouseWheel { delta, .. } => {
                self.input.mouse_wheel += match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / 100.0) as f32,
                };
            }

            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, repeat, .. },
                ..
            } => match state {
                ElementState::Pressed => {
                    if code == KeyCode::F11 && !repeat {
                        self.toggle_fullscreen();
                    }
                    self.input.key_down(code);
                }
                ElementState::Released => self.input.key_up(code),
            },

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::demos::LightField;

    fn app() -> App {
        App {
            config: PipelineConfig::deferred(),
            scene: Box::new(LightField::new()),
            running: None,
            input: InputState::new(),
            started: Instant::now(),
            last_frame: None,
            frame: 0,
            exit_code: EXIT_OK,
        }
    }

    #[test]
    fn runtime_failures_set_failure_exit_code() {
        let mut app = app();
        assert_eq!(app.exit_code, EXIT_OK);
        let err = RenderError::incomplete("lighting", "color attachments differ in size");
        app.record_failure("resize to 640x480", &err);
        assert_eq!(app.exit_code, EXIT_STARTUP_FAILURE);
        app.record_failure("frame 3", &RenderError::config("bad"));
        assert_eq!(app.exit_code, -1);
    }
}
