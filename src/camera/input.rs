//! Keyboard and mouse input translated into camera motion.

use std::collections::HashSet;

use glam::Vec3;

use super::Camera;

/// Movement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Back,
    Left,
    Right,
    Down,
    Up,
}

impl Key {
    /// Map a WASD/QE character, case-insensitive.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Self::Forward),
            's' => Some(Self::Back),
            'a' => Some(Self::Left),
            'd' => Some(Self::Right),
            'q' => Some(Self::Down),
            'e' => Some(Self::Up),
            _ => None,
        }
    }
}

/// Collects discrete input events and applies them as per-frame deltas.
#[derive(Debug, Clone)]
pub struct InputController {
    pressed: HashSet<Key>,
    dragging: bool,
    last_mouse: (f32, f32),
    /// Look change since the last `update`.
    look_dirty: bool,
    /// Units per second.
    pub move_speed: f32,
    /// Degrees per pixel.
    pub mouse_sensitivity: f32,
}

impl Default for InputController {
    fn default() -> Self {
        Self::new(5.0, 0.1)
    }
}

impl InputController {
    pub fn new(move_speed: f32, mouse_sensitivity: f32) -> Self {
        Self {
            pressed: HashSet::new(),
            dragging: false,
            last_mouse: (0.0, 0.0),
            look_dirty: false,
            move_speed,
            mouse_sensitivity,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        self.pressed.insert(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    pub fn mouse_down(&mut self, x: f32, y: f32) {
        self.dragging = true;
        self.last_mouse = (x, y);
    }

    pub fn mouse_up(&mut self) {
        self.dragging = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Rotate the camera while dragging. Returns true if it turned.
    pub fn mouse_move(&mut self, camera: &mut Camera, x: f32, y: f32) -> bool {
        if !self.dragging {
            return false;
        }
        let (dx, dy) = (x - self.last_mouse.0, y - self.last_mouse.1);
        self.last_mouse = (x, y);
        if dx == 0.0 && dy == 0.0 {
            return false;
        }
        camera.add_yaw(-dx * self.mouse_sensitivity);
        camera.add_pitch(-dy * self.mouse_sensitivity);
        self.look_dirty = true;
        true
    }

    /// Release everything, e.g. on focus loss.
    pub fn reset(&mut self) {
        self.pressed.clear();
        self.dragging = false;
        self.look_dirty = false;
    }

    /// Apply held keys for `dt` seconds. Returns true if the camera moved or
    /// turned since the previous call.
    pub fn update(&mut self, camera: &mut Camera, dt: f32) -> bool {
        let turned = std::mem::take(&mut self.look_dirty);
        if self.pressed.is_empty() {
            return turned;
        }

        let forward = camera.forward();
        let right = camera.right();
        let step = self.move_speed * dt;
        let mut offset = Vec3::ZERO;
        for key in &self.pressed {
            offset += match key {
                Key::Forward => forward,
                Key::Back => -forward,
                Key::Right => right,
                Key::Left => -right,
                Key::Up => Vec3::Y,
                Key::Down => Vec3::NEG_Y,
            } * step;
        }

        if offset.length_squared() > 0.0 {
            camera.translate(offset);
            return true;
        }
        turned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(Key::from_char('W'), Some(Key::Forward));
        assert_eq!(Key::from_char('e'), Some(Key::Up));
        assert_eq!(Key::from_char('x'), None);
    }

    #[test]
    fn test_forward_motion_scaled_by_dt() {
        let mut cam = Camera::default();
        let mut input = InputController::new(2.0, 0.1);
        input.key_down(Key::Forward);
        assert!(input.update(&mut cam, 0.5));
        assert!((cam.position() - Vec3::new(0.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut cam = Camera::default();
        let mut input = InputController::default();
        input.key_down(Key::Left);
        input.key_down(Key::Right);
        assert!(!input.update(&mut cam, 0.016));
        assert_eq!(cam.position(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_idle_reports_no_motion() {
        let mut cam = Camera::default();
        let mut input = InputController::default();
        assert!(!input.update(&mut cam, 0.016));
        input.key_down(Key::Up);
        input.key_up(Key::Up);
        assert!(!input.update(&mut cam, 0.016));
    }

    #[test]
    fn test_drag_turns_camera() {
        let mut cam = Camera::default();
        let mut input = InputController::new(5.0, 0.5);
        assert!(!input.mouse_move(&mut cam, 10.0, 0.0));

        input.mouse_down(100.0, 100.0);
        assert!(input.mouse_move(&mut cam, 80.0, 100.0));
        assert!((cam.yaw_degrees() - 10.0).abs() < 1e-3);
        assert!(input.update(&mut cam, 0.016));
        assert!(!input.update(&mut cam, 0.016));

        input.mouse_up();
        assert!(!input.mouse_move(&mut cam, 0.0, 0.0));
    }
}
