//! Action groups: the set of prioritized actions that make up one mode

use super::drive::{JoyDrive, KeyDrive};
use super::limiters::{BackwardsLimiter, ForwardsLimiter, TableSensorLimiter};
use super::recovery::{Bumpers, StallRecover};
use super::wander::{AvoidFront, ConstantVelocity};
use super::Action;
use crate::error::{CoreError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// An action together with its priority
pub struct PrioritizedAction {
    pub priority: i32,
    pub action: Box<dyn Action>,
}

/// An ordered set of actions. Entries are kept sorted by descending priority;
/// equal priorities keep insertion order
pub struct ActionGroup {
    name: String,
    // only the control thread evaluates actions, the lock is uncontended
    entries: Mutex<Vec<PrioritizedAction>>,
}

impl ActionGroup {
    /// Create an empty group
    pub fn new(name: &str) -> Self {
        ActionGroup {
            name: name.to_string(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an action at the given priority
    pub fn add_action<A: Action + 'static>(&mut self, action: A, priority: i32) -> &mut Self {
        self.add_boxed(Box::new(action), priority)
    }

    pub fn add_boxed(&mut self, action: Box<dyn Action>, priority: i32) -> &mut Self {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| e.action.name() == action.name()) {
            warn!(
                "Action group '{}' already has an action named '{}'",
                self.name,
                action.name()
            );
        }
        let index = entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(entries.len());
        entries.insert(index, PrioritizedAction { priority, action });
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Action names and priorities in evaluation order
    pub fn actions(&self) -> Vec<(String, i32)> {
        self.lock()
            .iter()
            .map(|e| (e.action.name().to_string(), e.priority))
            .collect()
    }

    /// Pass parameters to the named action
    pub fn configure_action(&self, name: &str, params: &HashMap<String, f64>) -> Result<()> {
        let mut entries = self.lock();
        let entry = entries
            .iter_mut()
            .find(|e| e.action.name() == name)
            .ok_or_else(|| CoreError::UnknownAction(name.to_string()))?;
        entry.action.configure(params)
    }

    /// Reset every action in the group
    pub fn reset(&self) {
        for entry in self.lock().iter_mut() {
            entry.action.reset();
        }
    }

    /// Visit every action in evaluation order
    pub(crate) fn for_each_action<F>(&self, mut f: F)
    where
        F: FnMut(&mut PrioritizedAction),
    {
        for entry in self.lock().iter_mut() {
            f(entry);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PrioritizedAction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Teleoperation: obstacle limiters above joystick and keyboard drive
    pub fn teleoperation(joystick_present: bool) -> Self {
        let mut group = ActionGroup::new("teleop");
        group
            // don't hit any tables (if the robot has IR table sensors)
            .add_action(TableSensorLimiter::default(), 100)
            .add_action(
                ForwardsLimiter::new("speed limiter near", 300.0, 600.0, 250.0),
                95,
            )
            .add_action(
                ForwardsLimiter::new("speed limiter far", 300.0, 1100.0, 400.0),
                90,
            )
            // so we don't bump things backwards
            .add_action(BackwardsLimiter::default(), 85);

        let mut joydrive = JoyDrive::new("joydrive", 400.0, 15.0, joystick_present);
        // the joystick does nothing unless the trigger is held
        joydrive.set_stop_if_no_button_pressed(false);
        group
            .add_action(joydrive, 50)
            .add_action(KeyDrive::default(), 45);
        group
    }

    /// Wander: recover from stalls and bumps, turn away from obstacles, keep moving
    pub fn wander() -> Self {
        let mut group = ActionGroup::new("wander");
        group
            .add_action(StallRecover::default(), 100)
            .add_action(Bumpers::default(), 75)
            .add_action(AvoidFront::new("avoid front near", 225.0, 0.0, 15.0), 50)
            .add_action(AvoidFront::default(), 45)
            .add_action(ConstantVelocity::new("constant velocity", 400.0), 25);
        group
    }
}
