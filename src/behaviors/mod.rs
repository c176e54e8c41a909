//! Behaviors module for Prometheus robot
//!
//! An [`Action`] looks at the current [`RobotState`] and either passes or
//! returns an [`ActionDesired`]: any subset of the command fields, each with
//! an exclusivity flag, plus optional speed caps. Actions know nothing about
//! each other; the arbiter merges them by priority.
pub mod drive;
pub mod group;
pub mod limiters;
pub mod recovery;
pub mod wander;

use crate::common::units::MmPerSec;
use crate::common::Field;
use crate::error::{ActionError, CoreError, Result};
use crate::perception::RobotState;
use std::collections::HashMap;
use std::time::Duration;

pub use self::group::ActionGroup;

/// A motion behaviour evaluated once per control cycle
pub trait Action: Send {
    /// Name of this action, unique within its group
    fn name(&self) -> &str;

    /// Evaluate the action against the current state. Must not block
    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError>;

    /// Configure the action with parameters
    fn configure(&mut self, _params: &HashMap<String, f64>) -> Result<()> {
        Ok(())
    }

    /// Forget per-activation state; called when the action's group becomes active
    fn reset(&mut self) {}
}

/// Outcome of firing an action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionResult {
    Pass,
    Desire(ActionDesired),
}

/// One requested field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDesire {
    pub value: f64,
    pub exclusive: bool,
}

/// A partial command requested by one action
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActionDesired {
    translation: Option<FieldDesire>,
    heading_delta: Option<FieldDesire>,
    translation_accel: Option<FieldDesire>,
    max_forward: Option<MmPerSec>,
    max_reverse: Option<MmPerSec>,
}

impl ActionDesired {
    pub fn new() -> Self {
        ActionDesired::default()
    }

    pub fn set(mut self, field: Field, value: f64, exclusive: bool) -> Self {
        let desire = Some(FieldDesire { value, exclusive });
        match field {
            Field::Translation => self.translation = desire,
            Field::HeadingDelta => self.heading_delta = desire,
            Field::TranslationAccel => self.translation_accel = desire,
        }
        self
    }

    pub fn translation(self, value: MmPerSec) -> Self {
        self.set(Field::Translation, value, false)
    }

    pub fn exclusive_translation(self, value: MmPerSec) -> Self {
        self.set(Field::Translation, value, true)
    }

    pub fn heading_delta(self, value: f64) -> Self {
        self.set(Field::HeadingDelta, value, false)
    }

    pub fn exclusive_heading_delta(self, value: f64) -> Self {
        self.set(Field::HeadingDelta, value, true)
    }

    pub fn translation_accel(self, value: f64) -> Self {
        self.set(Field::TranslationAccel, value, false)
    }

    /// Cap forward speed at `limit` (mm/s, >= 0)
    pub fn max_forward(mut self, limit: MmPerSec) -> Self {
        self.max_forward = Some(limit.max(0.0));
        self
    }

    /// Cap reverse speed at `limit` (mm/s magnitude, >= 0)
    pub fn max_reverse(mut self, limit: MmPerSec) -> Self {
        self.max_reverse = Some(limit.max(0.0));
        self
    }

    pub fn field(&self, field: Field) -> Option<FieldDesire> {
        match field {
            Field::Translation => self.translation,
            Field::HeadingDelta => self.heading_delta,
            Field::TranslationAccel => self.translation_accel,
        }
    }

    pub fn forward_cap(&self) -> Option<MmPerSec> {
        self.max_forward
    }

    pub fn reverse_cap(&self) -> Option<MmPerSec> {
        self.max_reverse
    }

    /// True if every value present is a finite number
    pub fn is_finite(&self) -> bool {
        Field::ALL
            .iter()
            .filter_map(|f| self.field(*f))
            .all(|d| d.value.is_finite())
            && self.max_forward.map_or(true, f64::is_finite)
            && self.max_reverse.map_or(true, f64::is_finite)
    }
}

/// Apply `params[key]` to `target`, rejecting values that are not strictly positive
pub(crate) fn positive_param(
    params: &HashMap<String, f64>,
    key: &str,
    target: &mut f64,
) -> Result<()> {
    if let Some(&value) = params.get(key) {
        if !value.is_finite() || value <= 0.0 {
            return Err(CoreError::invalid_parameter(key, "must be positive"));
        }
        *target = value;
    }
    Ok(())
}

/// Apply `params[key]` to `target`, rejecting negative values
pub(crate) fn non_negative_param(
    params: &HashMap<String, f64>,
    key: &str,
    target: &mut f64,
) -> Result<()> {
    if let Some(&value) = params.get(key) {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::invalid_parameter(key, "must not be negative"));
        }
        *target = value;
    }
    Ok(())
}

/// Apply `params[key]`, in seconds, to `target`; the value must be positive and fit a `Duration`
pub(crate) fn duration_param(
    params: &HashMap<String, f64>,
    key: &str,
    target: &mut Duration,
) -> Result<()> {
    if !params.contains_key(key) {
        return Ok(());
    }
    let mut secs = 0.0;
    positive_param(params, key, &mut secs)?;
    *target = Duration::try_from_secs_f64(secs)
        .map_err(|_| CoreError::invalid_parameter(key, "is too large for a duration"))?;
    Ok(())
}
