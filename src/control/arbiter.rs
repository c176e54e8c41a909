//! Fixed-priority resolution of action contributions into one command
//!
//! Actions are visited from the highest priority down. The first action to set
//! a field owns it for the cycle; lower priorities can no longer change it.
//! A field set with the exclusive flag is also shielded from speed caps
//! contributed further down. Caps from every contributor combine by minimum
//! and clamp the translation unless it was exclusively claimed. Fields nobody
//! set keep last cycle's value; a mode change starts again from a stop.

use super::modes::{Mode, ModeController};
use crate::behaviors::{Action, ActionDesired, ActionGroup, ActionResult};
use crate::common::{Command, Field, FieldSet};
use crate::perception::RobotState;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Accumulates contributions for one cycle
#[derive(Debug, Clone)]
pub struct Resolution {
    command: Command,
    set: FieldSet,
    exclusive: FieldSet,
    forward_cap: f64,
    reverse_cap: f64,
}

impl Resolution {
    /// Start a cycle from the previous command
    pub fn new(previous: Command) -> Self {
        Resolution {
            command: previous,
            set: FieldSet::empty(),
            exclusive: FieldSet::empty(),
            forward_cap: f64::INFINITY,
            reverse_cap: f64::INFINITY,
        }
    }

    /// Merge the next contribution; callers go in descending priority
    pub fn apply(&mut self, desired: &ActionDesired) {
        if let Some(cap) = desired.forward_cap() {
            self.forward_cap = self.forward_cap.min(cap);
        }
        if let Some(cap) = desired.reverse_cap() {
            self.reverse_cap = self.reverse_cap.min(cap);
        }

        for field in Field::ALL {
            let desire = match desired.field(field) {
                Some(desire) => desire,
                None => continue,
            };
            if self.set.contains(field) {
                continue;
            }
            self.command.set(field, desire.value);
            self.set.insert(field);
            if desire.exclusive {
                self.exclusive.insert(field);
                if field == Field::Translation {
                    // only caps from this priority and above bind an exclusive value
                    self.command.translation = self.clamp_translation(desire.value);
                }
            }
        }
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.set.contains(field)
    }

    pub fn is_exclusive(&self, field: Field) -> bool {
        self.exclusive.contains(field)
    }

    /// Produce the command for this cycle
    pub fn finish(mut self) -> Command {
        if !self.exclusive.contains(Field::Translation) {
            self.command.translation = self.clamp_translation(self.command.translation);
        }
        self.command
    }

    fn clamp_translation(&self, value: f64) -> f64 {
        value.min(self.forward_cap).max(-self.reverse_cap)
    }
}

/// Runs the active group each cycle and remembers the last command
#[derive(Debug, Default)]
pub struct Arbiter {
    previous: Command,
    active_mode: Option<Mode>,
    contributors: Vec<String>,
    faults: u64,
}

impl Arbiter {
    pub fn new() -> Self {
        Arbiter::default()
    }

    /// The command produced by the last cycle
    pub fn previous(&self) -> Command {
        self.previous
    }

    /// Names of the actions that contributed on the last cycle
    pub fn contributors(&self) -> &[String] {
        &self.contributors
    }

    /// Number of action faults swallowed so far
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Resolve against whatever mode is active right now
    pub fn resolve_active(&mut self, modes: &ModeController, state: &RobotState) -> Command {
        let active = modes.active();
        let mode = active.map(|(mode, _)| mode);
        if mode != self.active_mode {
            if let Some((mode, group)) = active {
                debug!("Arbiter switching to {} actions", mode);
                group.reset();
            }
            // nothing the old group asked for is held into the new mode
            self.previous = Command::stop();
            self.active_mode = mode;
        }
        self.resolve(active.map(|(_, group)| group), state)
    }

    /// Resolve one cycle over `group`; no group holds the previous command
    pub fn resolve(&mut self, group: Option<&ActionGroup>, state: &RobotState) -> Command {
        let mut resolution = Resolution::new(self.previous);
        self.contributors.clear();

        if let Some(group) = group {
            group.for_each_action(|entry| {
                if let Some(desired) = self.fire_guarded(entry.action.as_mut(), state) {
                    self.contributors.push(entry.action.name().to_string());
                    resolution.apply(&desired);
                }
            });
        }

        let command = resolution.finish();
        self.previous = command;
        command
    }

    /// Fire an action; faults, panics and non-finite values count as no contribution
    fn fire_guarded(&mut self, action: &mut dyn Action, state: &RobotState) -> Option<ActionDesired> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.fire(state)));
        match outcome {
            Ok(Ok(ActionResult::Pass)) => None,
            Ok(Ok(ActionResult::Desire(desired))) if desired.is_finite() => Some(desired),
            Ok(Ok(ActionResult::Desire(_))) => {
                self.faults += 1;
                warn!("Action '{}' produced a non-finite value, ignoring it", action.name());
                None
            }
            Ok(Err(e)) => {
                self.faults += 1;
                warn!("Action '{}' failed: {}", action.name(), e);
                None
            }
            Err(_) => {
                self.faults += 1;
                warn!("Action '{}' panicked, ignoring it this cycle", action.name());
                None
            }
        }
    }
}
