//! Operating modes and exclusive activation of their action groups

use crate::behaviors::ActionGroup;
use crate::error::{CoreError, Result};
use crate::input::{KeyCode, KeyHandler};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Mutually exclusive operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Teleoperation,
    Wander,
}

// 0 is reserved for "nothing active yet"
const NO_MODE: u8 = 0;

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Teleoperation, Mode::Wander];

    fn id(self) -> u8 {
        match self {
            Mode::Teleoperation => 1,
            Mode::Wander => 2,
        }
    }

    fn from_id(id: u8) -> Option<Mode> {
        match id {
            1 => Some(Mode::Teleoperation),
            2 => Some(Mode::Wander),
            _ => None,
        }
    }

    /// Operator help printed when the mode becomes active
    pub fn banner(self) -> &'static str {
        match self {
            Mode::Teleoperation => {
                "\n== Teleoperation Mode ==\n   \
                 Use the arrow keys (i/j/k/l) to drive, and the spacebar to stop.\n   \
                 For joystick control hold the trigger button.\n   \
                 Press 'w' to switch to wander mode.\n   \
                 Press escape (q) to exit."
            }
            Mode::Wander => {
                "\n== Wander Mode ==\n   \
                 The robot will now just wander around avoiding things.\n   \
                 Press 't' to switch to teleop mode.\n   \
                 Press escape (q) to exit."
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Teleoperation => write!(f, "teleoperation"),
            Mode::Wander => write!(f, "wander"),
        }
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "teleop" | "teleoperation" => Ok(Mode::Teleoperation),
            "wander" => Ok(Mode::Wander),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

/// Result of one call to [`ModeController::activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub mode: Mode,
    pub previous: Option<Mode>,
    /// Order in which activations took the lock, starting at 1
    pub sequence: u64,
}

impl Activation {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.mode)
    }
}

/// Owns one action group per mode and which of them is active.
///
/// Activations serialize on one lock held only for the swap; the arbiter reads
/// the active mode lock-free from an atomic.
pub struct ModeController {
    groups: HashMap<Mode, ActionGroup>,
    active: AtomicU8,
    sequence: Mutex<u64>,
    announce: bool,
}

impl ModeController {
    /// Create a controller with no groups
    pub fn new() -> Self {
        ModeController {
            groups: HashMap::new(),
            active: AtomicU8::new(NO_MODE),
            sequence: Mutex::new(0),
            announce: true,
        }
    }

    /// The teleoperation and wander groups
    pub fn standard(joystick_present: bool) -> Self {
        ModeController::new()
            .with_group(Mode::Teleoperation, ActionGroup::teleoperation(joystick_present))
            .with_group(Mode::Wander, ActionGroup::wander())
    }

    pub fn with_group(mut self, mode: Mode, group: ActionGroup) -> Self {
        self.register(mode, group);
        self
    }

    /// Register (or replace) the group for a mode
    pub fn register(&mut self, mode: Mode, group: ActionGroup) {
        if self.groups.insert(mode, group).is_some() {
            debug!("Replaced action group for {}", mode);
        }
    }

    /// Do not print mode banners
    pub fn quiet(mut self) -> Self {
        self.announce = false;
        self
    }

    pub fn group(&self, mode: Mode) -> Option<&ActionGroup> {
        self.groups.get(&mode)
    }

    pub fn active_mode(&self) -> Option<Mode> {
        Mode::from_id(self.active.load(Ordering::Acquire))
    }

    /// The active mode and its group
    pub fn active(&self) -> Option<(Mode, &ActionGroup)> {
        let mode = self.active_mode()?;
        self.groups.get(&mode).map(|group| (mode, group))
    }

    /// Number of activations performed so far
    pub fn activation_count(&self) -> u64 {
        *self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `mode` the only active group
    pub fn activate(&self, mode: Mode) -> Result<Activation> {
        if !self.groups.contains_key(&mode) {
            return Err(CoreError::UnknownMode(mode.to_string()));
        }

        let activation = {
            let mut sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
            *sequence += 1;
            let previous = Mode::from_id(self.active.swap(mode.id(), Ordering::AcqRel));
            Activation {
                mode,
                previous,
                sequence: *sequence,
            }
        };

        if activation.changed() {
            info!("Activated {} mode (#{})", mode, activation.sequence);
        } else {
            debug!("{} mode already active", mode);
        }
        if self.announce {
            println!("{}", mode.banner());
        }
        Ok(activation)
    }

    /// Activate `mode` from a worker thread; join the handle before exiting
    pub fn spawn_activation(
        self: &Arc<Self>,
        mode: Mode,
    ) -> std::io::Result<JoinHandle<Result<Activation>>> {
        let modes = Arc::clone(self);
        thread::Builder::new()
            .name(format!("{}-init", mode))
            .spawn(move || modes.activate(mode))
    }

    /// Bind 'w'/'W' to wander and 't'/'T' to teleoperation
    pub fn register_key_handlers(self: &Arc<Self>, keys: &mut KeyHandler) {
        let bindings = [
            ('w', Mode::Wander),
            ('W', Mode::Wander),
            ('t', Mode::Teleoperation),
            ('T', Mode::Teleoperation),
        ];
        for (key, mode) in bindings {
            let modes = Arc::clone(self);
            let bound = keys.add_key_handler(KeyCode::Char(key), move || {
                if let Err(e) = modes.activate(mode) {
                    error!("Could not switch to {} mode: {}", mode, e);
                }
            });
            if !bound {
                debug!("Key '{}' already bound, not switching it to {}", key, mode);
            }
        }
    }
}

impl Default for ModeController {
    fn default() -> Self {
        ModeController::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputEvent, InputQueue};

    fn controller() -> ModeController {
        ModeController::standard(false).quiet()
    }

    #[test]
    fn nothing_is_active_until_first_activation() {
        let modes = controller();
        assert_eq!(modes.active_mode(), None);
        assert!(modes.active().is_none());
    }

    #[test]
    fn activation_reports_previous_mode() {
        let modes = controller();
        let first = modes.activate(Mode::Teleoperation).unwrap();
        assert_eq!(first.previous, None);
        assert!(first.changed());

        let second = modes.activate(Mode::Wander).unwrap();
        assert_eq!(second.previous, Some(Mode::Teleoperation));
        assert_eq!(second.sequence, 2);
        assert_eq!(modes.active().unwrap().1.name(), "wander");
    }

    #[test]
    fn reactivation_is_idempotent() {
        let modes = controller();
        modes.activate(Mode::Wander).unwrap();
        let again = modes.activate(Mode::Wander).unwrap();
        assert!(!again.changed());
        assert_eq!(modes.active_mode(), Some(Mode::Wander));
    }

    #[test]
    fn unregistered_mode_is_rejected() {
        let modes = ModeController::new()
            .with_group(Mode::Wander, ActionGroup::wander())
            .quiet();
        assert!(matches!(
            modes.activate(Mode::Teleoperation),
            Err(CoreError::UnknownMode(_))
        ));
        assert_eq!(modes.active_mode(), None);
        assert_eq!(modes.activation_count(), 0);
    }

    #[test]
    fn keys_switch_modes() {
        let modes = Arc::new(controller());
        let mut keys = KeyHandler::new(InputQueue::new());
        modes.register_key_handlers(&mut keys);

        keys.handle(InputEvent::Key(KeyCode::Char('W')));
        assert_eq!(modes.active_mode(), Some(Mode::Wander));
        keys.handle(InputEvent::Key(KeyCode::Char('t')));
        assert_eq!(modes.active_mode(), Some(Mode::Teleoperation));
    }

    #[test]
    fn worker_activation_is_joinable() {
        let modes = Arc::new(controller());
        let handle = modes.spawn_activation(Mode::Wander).unwrap();
        let activation = handle.join().unwrap().unwrap();
        assert_eq!(activation.mode, Mode::Wander);
        assert_eq!(modes.active_mode(), Some(Mode::Wander));
    }

    #[test]
    fn modes_parse_from_cli_names() {
        assert_eq!("teleop".parse::<Mode>().unwrap(), Mode::Teleoperation);
        assert_eq!("Wander".parse::<Mode>().unwrap(), Mode::Wander);
        assert!("patrol".parse::<Mode>().is_err());
    }
}
