use glam::Vec2;
use rustc_hash::FxHashSet;
use winit::keyboard::KeyCode;

/// Keyboard and mouse state accumulated between two simulation steps.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: FxHashSet<KeyCode>,
    pub mouse_delta: Vec2,
    pub left_click: bool,
    pub right_click: bool,
}

impl InputState {
    pub fn press_key(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Reads a key as a one-shot toggle: reports it once, then treats it as
    /// released until the next press event.
    pub fn consume_key(&mut self, key: KeyCode) -> bool {
        self.pressed_keys.remove(&key)
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    pub fn consume_left_click(&mut self) -> bool {
        let value = self.left_click;
        self.left_click = false;
        value
    }

    pub fn consume_right_click(&mut self) -> bool {
        let value = self.right_click;
        self.right_click = false;
        value
    }
}
