use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::Movement;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphanumeric() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-character keys the controls can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Left,
    Right,
    Up,
    Down,
    Escape,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
}

/// Keys bound to each camera movement and to quitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub forward: Vec<KeyCode>,
    pub backward: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub exit: Vec<KeyCode>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use NamedKey::*;
        Self {
            forward: vec![KeyCode::Character('W'), KeyCode::Named(Up)],
            backward: vec![KeyCode::Character('S'), KeyCode::Named(Down)],
            left: vec![KeyCode::Character('A'), KeyCode::Named(Left)],
            right: vec![KeyCode::Character('D'), KeyCode::Named(Right)],
            exit: vec![KeyCode::Named(Escape)],
        }
    }
}

impl KeyBindings {
    pub fn keys_for(&self, movement: Movement) -> &[KeyCode] {
        match movement {
            Movement::Forward => &self.forward,
            Movement::Backward => &self.backward,
            Movement::Left => &self.left,
            Movement::Right => &self.right,
        }
    }
}

/// Input gathered from the window between two frames.
///
/// Held keys persist until released; pointer samples, scroll and the
/// pointer-reset flag are consumed by the frame that reads them.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    pointer_samples: Vec<Vec2>,
    virtual_pointer: Vec2,
    scroll: f32,
    pointer_reset: bool,
    close_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn any_down(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|key| self.is_key_down(*key))
    }

    /// Drops all held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.keys.clear();
    }

    pub fn push_pointer(&mut self, position: Vec2) {
        self.pointer_samples.push(position);
    }

    /// Records relative device motion as a position on an unbounded virtual
    /// pointer, so looking keeps working while the real cursor is pinned.
    pub fn push_pointer_motion(&mut self, delta: Vec2) {
        if !delta.is_finite() {
            return;
        }
        self.virtual_pointer += delta;
        self.pointer_samples.push(self.virtual_pointer);
    }

    pub fn add_scroll(&mut self, delta: f32) {
        self.scroll += delta;
    }

    /// Marks that the next pointer sample must not be treated as a move.
    pub fn reset_pointer(&mut self) {
        self.pointer_reset = true;
        self.pointer_samples.clear();
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub fn take_pointer_samples(&mut self) -> Vec<Vec2> {
        std::mem::take(&mut self.pointer_samples)
    }

    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll)
    }

    pub fn take_pointer_reset(&mut self) -> bool {
        std::mem::take(&mut self.pointer_reset)
    }
}
