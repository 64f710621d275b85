use serde::{Deserialize, Serialize};

// ── WindowMode ────────────────────────────────────────────────────────────────

/// Controls how the OS window is presented.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowMode {
    /// Standard decorated window at the configured size.
    Windowed,
    /// Borderless window covering the current monitor.
    Borderless,
}

// ── WindowConfig ──────────────────────────────────────────────────────────────

/// Window settings; the size is in physical pixels and also sets the initial
/// resolution of every screen-matched render target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub mode: WindowMode,
    pub resizable: bool,
    pub vsync: bool,
}

impl Default for WindowConfig {
    /// 1280 × 720, windowed, resizable, vsync on.
    fn default() -> Self {
        Self {
            title: "lightpass".into(),
            width: 1280,
            height: 720,
            mode: WindowMode::Windowed,
            resizable: true,
            vsync: true,
        }
    }
}

impl WindowConfig {
    /// `width / height`, or `0.0` when `height` is zero.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }
}
