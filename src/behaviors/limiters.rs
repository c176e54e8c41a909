//! Speed limiters: keep the robot off table edges and out of obstacles

use super::{non_negative_param, positive_param, Action, ActionDesired, ActionResult};
use crate::common::units::{Degrees, Mm, MmPerSec, MmPerSec2};
use crate::error::{ActionError, CoreError, Result};
use crate::perception::RobotState;
use std::collections::HashMap;
use tracing::debug;

/// Linear slow-down between a stop distance and a slow distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowDownZone {
    pub stop_distance: Mm,
    pub slow_distance: Mm,
    /// Speed allowed at the slow distance
    pub slow_speed: MmPerSec,
}

impl SlowDownZone {
    /// Speed cap for an obstacle at `distance`, `None` if it is beyond the zone
    pub fn cap(&self, distance: Mm) -> Option<MmPerSec> {
        if distance <= self.stop_distance {
            Some(0.0)
        } else if distance < self.slow_distance {
            let fraction =
                (distance - self.stop_distance) / (self.slow_distance - self.stop_distance);
            Some(self.slow_speed * fraction)
        } else {
            None
        }
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let mut zone = *self;
        non_negative_param(params, "stop_distance", &mut zone.stop_distance)?;
        positive_param(params, "slow_distance", &mut zone.slow_distance)?;
        positive_param(params, "slow_speed", &mut zone.slow_speed)?;
        if zone.slow_distance <= zone.stop_distance {
            return Err(CoreError::invalid_parameter(
                "slow_distance",
                "must be greater than stop_distance",
            ));
        }
        *self = zone;
        Ok(())
    }
}

/// Stops forward motion when a downward IR sensor loses the floor
#[derive(Debug)]
pub struct TableSensorLimiter {
    name: String,
    max_floor_distance: Mm,
}

impl TableSensorLimiter {
    pub fn new(name: &str, max_floor_distance: Mm) -> Self {
        TableSensorLimiter {
            name: name.to_string(),
            max_floor_distance,
        }
    }
}

impl Default for TableSensorLimiter {
    fn default() -> Self {
        TableSensorLimiter::new("table sensor limiter", 100.0)
    }
}

impl Action for TableSensorLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        let floor = &state.robot.floor_ranges;
        if floor.is_empty() {
            return Ok(ActionResult::Pass);
        }
        let edge = floor
            .iter()
            .any(|r| !r.is_finite() || *r > self.max_floor_distance);
        if !edge {
            return Ok(ActionResult::Pass);
        }
        debug!("{}: no floor ahead, stopping", self.name);
        Ok(ActionResult::Desire(
            ActionDesired::new().exclusive_translation(0.0).max_forward(0.0),
        ))
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        positive_param(params, "max_floor_distance", &mut self.max_floor_distance)
    }
}

/// Caps forward speed from the nearest obstacle in front of the robot
#[derive(Debug)]
pub struct ForwardsLimiter {
    name: String,
    zone: SlowDownZone,
    max_speed: MmPerSec,
    half_width: Degrees,
    stop_decel: MmPerSec2,
}

impl ForwardsLimiter {
    pub fn new(name: &str, stop_distance: Mm, slow_distance: Mm, slow_speed: MmPerSec) -> Self {
        ForwardsLimiter {
            name: name.to_string(),
            zone: SlowDownZone {
                stop_distance,
                slow_distance,
                slow_speed,
            },
            max_speed: 2000.0,
            half_width: 30.0,
            stop_decel: 1000.0,
        }
    }

    pub fn zone(&self) -> SlowDownZone {
        self.zone
    }
}

impl Action for ForwardsLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        let closest = match state.closest_in_arc(-self.half_width, self.half_width) {
            Some(reading) => reading,
            None => return Ok(ActionResult::Pass),
        };
        let cap = match self.zone.cap(closest.range) {
            Some(cap) if cap < self.max_speed => cap,
            _ => return Ok(ActionResult::Pass),
        };

        let mut desired = ActionDesired::new().max_forward(cap);
        if cap == 0.0 {
            desired = desired.translation_accel(self.stop_decel);
        }
        debug!(
            "{}: obstacle at {:.0} mm, forward speed capped at {:.0}",
            self.name, closest.range, cap
        );
        Ok(ActionResult::Desire(desired))
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let mut zone = self.zone;
        let (mut max_speed, mut half_width, mut stop_decel) =
            (self.max_speed, self.half_width, self.stop_decel);
        zone.configure(params)?;
        positive_param(params, "max_speed", &mut max_speed)?;
        positive_param(params, "half_width", &mut half_width)?;
        positive_param(params, "stop_decel", &mut stop_decel)?;
        self.zone = zone;
        self.max_speed = max_speed;
        self.half_width = half_width;
        self.stop_decel = stop_decel;
        Ok(())
    }
}

/// Caps reverse speed from the nearest obstacle behind the robot
#[derive(Debug)]
pub struct BackwardsLimiter {
    name: String,
    zone: SlowDownZone,
    half_width: Degrees,
}

impl BackwardsLimiter {
    pub fn new(name: &str, stop_distance: Mm, slow_distance: Mm, max_speed: MmPerSec) -> Self {
        BackwardsLimiter {
            name: name.to_string(),
            zone: SlowDownZone {
                stop_distance,
                slow_distance,
                slow_speed: max_speed,
            },
            half_width: 40.0,
        }
    }
}

impl Default for BackwardsLimiter {
    fn default() -> Self {
        BackwardsLimiter::new("backwards limiter", 250.0, 600.0, 250.0)
    }
}

impl Action for BackwardsLimiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        let start = 180.0 - self.half_width;
        let end = -180.0 + self.half_width;
        let cap = state
            .closest_in_arc(start, end)
            .and_then(|reading| self.zone.cap(reading.range));
        match cap {
            Some(cap) => Ok(ActionResult::Desire(ActionDesired::new().max_reverse(cap))),
            None => Ok(ActionResult::Pass),
        }
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let mut zone = self.zone;
        let mut half_width = self.half_width;
        zone.configure(params)?;
        positive_param(params, "half_width", &mut half_width)?;
        self.zone = zone;
        self.half_width = half_width;
        Ok(())
    }
}
