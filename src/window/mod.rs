pub mod config;

pub use config::{WindowConfig, WindowMode};

use winit::dpi::PhysicalSize;
use winit::window::{Fullscreen, Window, WindowAttributes};

/// Window attributes for creating a window described by `config`.
pub fn window_attributes(config: &WindowConfig) -> WindowAttributes {
    let attrs = Window::default_attributes()
        .with_title(&config.title)
        .with_inner_size(PhysicalSize::new(config.width.max(1), config.height.max(1)))
        .with_resizable(config.resizable);
    match config.mode {
        WindowMode::Windowed => attrs,
        WindowMode::Borderless => attrs.with_fullscreen(Some(Fullscreen::Borderless(None))),
    }
}

/// Re-apply `config` to an existing window.
///
/// In `Windowed` mode the size request may complete later as a
/// `WindowEvent::Resized`; the resize handler reconciles render targets then.
pub fn apply_window_settings(window: &Window, config: &WindowConfig) {
    match config.mode {
        WindowMode::Windowed => {
            window.set_fullscreen(None);
            window.set_decorations(true);
            window.set_resizable(config.resizable);
            let _ = window.request_inner_size(PhysicalSize::new(config.width, config.height));
        }
        WindowMode::Borderless => {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }
    window.set_title(&config.title);
}
