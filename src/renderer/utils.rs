// ── Viewport math ─────────────────────────────────────────────────────────────
//
// Every offscreen draw covers its whole attachment at the bound mip level.

// ── Viewport ──────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in physical pixels, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Viewport covering a `width × height` attachment.
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0.0, y: 0.0, width: width as f32, height: height as f32 }
    }

    /// `width / height`, or `0.0` for a degenerate rectangle.
    pub fn aspect(&self) -> f32 {
        if self.height <= 0.0 {
            return 0.0;
        }
        self.width / self.height
    }

    /// Set this rectangle as the active viewport of `pass` with the full depth range.
    pub fn apply(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_viewport(self.x, self.y, self.width, self.height, 0.0, 1.0);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_viewport_starts_at_origin() {
        let v = Viewport::full(1280, 720);
        assert_eq!(v.x, 0.0);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.width, 1280.0);
        assert_eq!(v.height, 720.0);
    }

    // ── aspect ────────────────────────────────────────────────────────────────

    #[test]
    fn aspect_of_wide_viewport() {
        let v = Viewport::full(1600, 900);
        assert!((v.aspect() - 16.0 / 9.0).abs() < 1e-5);
    }

    #[test]
    fn zero_height_aspect_is_zero() {
        let v = Viewport { x: 0.0, y: 0.0, width: 10.0, height: 0.0 };
        assert_eq!(v.aspect(), 0.0);
    }
}
