use std::collections::HashSet;
pub use winit::keyboard::KeyCode;
pub use winit::event::MouseButton;

use crate::renderer::utils::Viewport;

/// Raw hardware state for a single frame.
#[derive(Debug, Default)]
pub struct InputState {
    pub keys_held: HashSet<KeyCode>,
    pub keys_pressed: HashSet<KeyCode>,
    pub keys_released: HashSet<KeyCode>,

    pub mouse_pos: [f32; 2],
    /// Cursor travel since the previous frame, in physical pixels.
    pub mouse_delta: [f32; 2],
    pub mouse_wheel: f32,
    pub mouse_held: HashSet<MouseButton>,
    pub mouse_pressed: HashSet<MouseButton>,
    pub mouse_released: HashSet<MouseButton>,

    cursor_seen: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_frame_state(&mut self) {
        self.keys_pressed.clear();
        self.keys_released.clear();
        self.mouse_pressed.clear();
        self.mouse_released.clear();
        self.mouse_delta = [0.0, 0.0];
        self.mouse_wheel = 0.0;
    }

    /// Record a new cursor position. The first event only seeds the position
    /// so the camera does not jump when the cursor enters the window.
    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        if self.cursor_seen {
            self.mouse_delta[0] += x - self.mouse_pos[0];
            self.mouse_delta[1] += y - self.mouse_pos[1];
        }
        self.cursor_seen = true;
        self.mouse_pos = [x, y];
    }

    pub fn key_down(&mut self, key: KeyCode) {
        if self.keys_held.insert(key) {
            self.keys_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.keys_held.remove(&key);
        self.keys_released.insert(key);
    }

    pub fn mouse_down(&mut self, button: MouseButton) {
        if self.mouse_held.insert(button) {
            self.mouse_pressed.insert(button);
        }
    }

    pub fn mouse_up(&mut self, button: MouseButton) {
        self.mouse_held.remove(&button);
        self.mouse_released.insert(button);
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool { self.keys_held.contains(&key) }
    pub fn is_key_pressed(&self, key: KeyCode) -> bool { self.keys_pressed.contains(&key) }
    pub fn is_key_released(&self, key: KeyCode) -> bool { self.keys_released.contains(&key) }

    pub fn is_mouse_held(&self, button: MouseButton) -> bool { self.mouse_held.contains(&button) }
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool { self.mouse_pressed.contains(&button) }
    pub fn is_mouse_released(&self, button: MouseButton) -> bool { self.mouse_released.contains(&button) }
}

/// Everything a scene sees during one frame update.
///
/// Passed explicitly to [`crate::scene::Scene::update`]; there is no global
/// camera or input singleton.
pub struct FrameContext<'a> {
    /// Seconds since the previous frame.
    pub dt: f32,
    /// Seconds since the frame loop started.
    pub elapsed: f32,
    pub frame: u64,
    pub input: &'a InputState,
    pub viewport: Viewport,
}

impl FrameContext<'_> {
    pub fn aspect(&self) -> f32 {
        self.viewport.aspect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_reported_once_while_held() {
        let mut input = InputState::new();
        input.key_down(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        input.clear_frame_state();
        input.key_down(KeyCode::KeyW);
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_held(KeyCode::KeyW));
        input.key_up(KeyCode::KeyW);
        assert!(input.is_key_released(KeyCode::KeyW));
        assert!(!input.is_key_held(KeyCode::KeyW));
    }

    #[test]
    fn first_cursor_event_does_not_produce_delta() {
        let mut input = InputState::new();
        input.cursor_moved(400.0, 300.0);
        assert_eq!(input.mouse_delta, [0.0, 0.0]);
        input.cursor_moved(410.0, 295.0);
        assert_eq!(input.mouse_delta, [10.0, -5.0]);
        input.clear_frame_state();
        assert_eq!(input.mouse_delta, [0.0, 0.0]);
    }
}
