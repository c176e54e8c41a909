//! Operator input: key and joystick events, the key dispatch table and the queue
//! the drive actions read from

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Keys the core understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Space,
    Escape,
    Char(char),
}

/// One joystick sample. Axes are normalized to [-1, 1], `y` forward and `x` left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoystickSample {
    pub x: f64,
    pub y: f64,
    pub trigger: bool,
}

/// A decoded event delivered by the input service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    Key(KeyCode),
    Joystick(JoystickSample),
}

/// Events gathered since the previous cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    pub keys: Vec<KeyCode>,
    pub joystick: Option<JoystickSample>,
}

impl InputFrame {
    pub fn pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }
}

/// Events waiting for the control loop; written from any thread, drained once per cycle
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    pending: Arc<Mutex<InputFrame>>,
}

impl InputQueue {
    pub fn new() -> Self {
        InputQueue::default()
    }

    pub fn push(&self, event: InputEvent) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            InputEvent::Key(key) => pending.keys.push(key),
            // only the latest joystick sample matters
            InputEvent::Joystick(sample) => pending.joystick = Some(sample),
        }
    }

    /// Take everything delivered since the last drain
    pub fn drain(&self) -> InputFrame {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }
}

type Handler = Box<dyn Fn() + Send + Sync>;

/// Maps key codes to callbacks; keys without a handler fall through to the drive queue
pub struct KeyHandler {
    handlers: HashMap<KeyCode, Handler>,
    queue: InputQueue,
}

impl KeyHandler {
    pub fn new(queue: InputQueue) -> Self {
        KeyHandler {
            handlers: HashMap::new(),
            queue,
        }
    }

    /// Register a callback for a key. Returns false if the key was already taken
    pub fn add_key_handler<F>(&mut self, key: KeyCode, handler: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.handlers.contains_key(&key) {
            return false;
        }
        self.handlers.insert(key, Box::new(handler));
        true
    }

    pub fn has_handler(&self, key: KeyCode) -> bool {
        self.handlers.contains_key(&key)
    }

    /// Deliver an event from the input service
    pub fn handle(&self, event: InputEvent) {
        if let InputEvent::Key(key) = event {
            if let Some(handler) = self.handlers.get(&key) {
                debug!("Dispatching key {:?}", key);
                handler();
                return;
            }
        }
        self.queue.push(event);
    }

    pub fn queue(&self) -> &InputQueue {
        &self.queue
    }
}
