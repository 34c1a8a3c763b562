//! Input events and the cross-thread event queue.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::vector::Vector;

/// Keyboard keys the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    /// Letters and digits, letters always upper case.
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Space,
    Enter,
    Escape,
    Tab,
    Backspace,
    Shift,
    Control,
    Alt,
    F(u8),
}

impl Key {
    /// Normalizes letters to upper case.
    pub fn char(c: char) -> Self {
        Self::Char(c.to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Raw input as reported by the host. Mouse positions are in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    MouseDown { button: MouseButton, screen: Vector },
    MouseUp { button: MouseButton, screen: Vector },
    MouseMove { screen: Vector },
    MouseWheel { screen: Vector, delta: f64 },
}

/// Keyboard event as delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MouseAction {
    Down(MouseButton),
    Up(MouseButton),
    Move,
    Wheel(f64),
}

/// Mouse event as delivered to listeners, already in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub position: Vector,
    pub screen: Vector,
}

/// Start of a contact, delivered to the collision listeners of each
/// participant. `normal` points away from the receiving actor.
#[derive(Debug, Clone)]
pub struct CollisionEvent {
    pub other: Actor,
    pub normal: Vector,
    pub depth: f64,
}

/// Thread-safe FIFO of input events.
///
/// Hosts and audio threads push from anywhere; the game loop drains it once
/// per frame on the loop thread.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<InputEvent>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: InputEvent) {
        self.inner.lock().push_back(event);
    }

    pub fn extend(&self, events: impl IntoIterator<Item = InputEvent>) {
        self.inner.lock().extend(events);
    }

    /// Takes every queued event in arrival order.
    pub fn drain(&self) -> Vec<InputEvent> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
