//! Recovery behaviours: getting unstuck after a stall or a bump

use super::{duration_param, positive_param, Action, ActionDesired, ActionResult};
use crate::common::units::{Degrees, MmPerSec};
use crate::error::{ActionError, Result};
use crate::perception::RobotState;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
enum StallPhase {
    Idle,
    Recovering { until: Duration, turn: Degrees },
    /// Timed out; waits for the stall to clear before arming again
    Exhausted,
}

/// Backs up and turns while the drive reports a stall
#[derive(Debug)]
pub struct StallRecover {
    name: String,
    reverse_speed: MmPerSec,
    turn_amount: Degrees,
    timeout: Duration,
    phase: StallPhase,
}

impl StallRecover {
    pub fn new(name: &str, reverse_speed: MmPerSec, turn_amount: Degrees, timeout: Duration) -> Self {
        StallRecover {
            name: name.to_string(),
            reverse_speed,
            turn_amount,
            timeout,
            phase: StallPhase::Idle,
        }
    }

    pub fn is_recovering(&self) -> bool {
        matches!(self.phase, StallPhase::Recovering { .. })
    }

    /// Turn toward whichever side has more room
    fn pick_turn(&self, state: &RobotState) -> Degrees {
        let left = state.closest_in_arc(0.0, 90.0).map_or(f64::INFINITY, |r| r.range);
        let right = state.closest_in_arc(-90.0, 0.0).map_or(f64::INFINITY, |r| r.range);
        if left >= right {
            self.turn_amount
        } else {
            -self.turn_amount
        }
    }

    fn maneuver(&self, turn: Degrees) -> ActionResult {
        ActionResult::Desire(
            ActionDesired::new()
                .exclusive_translation(-self.reverse_speed)
                .exclusive_heading_delta(turn),
        )
    }
}

impl Default for StallRecover {
    fn default() -> Self {
        StallRecover::new("stall recover", 150.0, 45.0, Duration::from_secs(3))
    }
}

impl Action for StallRecover {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        let stalled = state.stalled();
        match self.phase {
            StallPhase::Idle if stalled => {
                let turn = self.pick_turn(state);
                info!("{}: stalled, backing up", self.name);
                self.phase = StallPhase::Recovering {
                    until: state.elapsed.saturating_add(self.timeout),
                    turn,
                };
                Ok(self.maneuver(turn))
            }
            StallPhase::Recovering { .. } | StallPhase::Exhausted if !stalled => {
                self.phase = StallPhase::Idle;
                Ok(ActionResult::Pass)
            }
            StallPhase::Recovering { until, .. } if state.elapsed >= until => {
                warn!("{}: still stalled after {:?}, giving up", self.name, self.timeout);
                self.phase = StallPhase::Exhausted;
                Ok(ActionResult::Pass)
            }
            StallPhase::Recovering { turn, .. } => Ok(self.maneuver(turn)),
            _ => Ok(ActionResult::Pass),
        }
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let (mut reverse_speed, mut turn_amount, mut timeout) =
            (self.reverse_speed, self.turn_amount, self.timeout);
        positive_param(params, "reverse_speed", &mut reverse_speed)?;
        positive_param(params, "turn_amount", &mut turn_amount)?;
        duration_param(params, "timeout", &mut timeout)?;
        self.reverse_speed = reverse_speed;
        self.turn_amount = turn_amount;
        self.timeout = timeout;
        Ok(())
    }

    fn reset(&mut self) {
        self.phase = StallPhase::Idle;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BumpManeuver {
    until: Duration,
    translation: MmPerSec,
    turn: Degrees,
}

/// Backs off from whatever a bumper touched
#[derive(Debug)]
pub struct Bumpers {
    name: String,
    back_off_speed: MmPerSec,
    back_off_time: Duration,
    turn_amount: Degrees,
    maneuver: Option<BumpManeuver>,
}

impl Bumpers {
    pub fn new(
        name: &str,
        back_off_speed: MmPerSec,
        back_off_time: Duration,
        turn_amount: Degrees,
    ) -> Self {
        Bumpers {
            name: name.to_string(),
            back_off_speed,
            back_off_time,
            turn_amount,
            maneuver: None,
        }
    }

    fn emit(maneuver: BumpManeuver) -> ActionResult {
        ActionResult::Desire(
            ActionDesired::new()
                .exclusive_translation(maneuver.translation)
                .exclusive_heading_delta(maneuver.turn),
        )
    }
}

impl Default for Bumpers {
    fn default() -> Self {
        Bumpers::new("bumpers", 100.0, Duration::from_millis(1500), 30.0)
    }
}

impl Action for Bumpers {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        if let Some(maneuver) = self.maneuver {
            if state.elapsed < maneuver.until {
                return Ok(Self::emit(maneuver));
            }
            self.maneuver = None;
        }

        let bumpers = state.robot.bumpers;
        if !bumpers.any() {
            return Ok(ActionResult::Pass);
        }

        let translation = match (bumpers.front(), bumpers.rear()) {
            (true, false) => -self.back_off_speed,
            (false, true) => self.back_off_speed,
            _ => 0.0,
        };
        // swing away from the side that touched
        let left = bumpers.front_left || bumpers.rear_left;
        let right = bumpers.front_right || bumpers.rear_right;
        let turn = if left && !right {
            -self.turn_amount
        } else {
            self.turn_amount
        };

        info!("{}: contact {:?}, backing off", self.name, bumpers);
        let maneuver = BumpManeuver {
            until: state.elapsed.saturating_add(self.back_off_time),
            translation,
            turn,
        };
        self.maneuver = Some(maneuver);
        Ok(Self::emit(maneuver))
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let (mut back_off_speed, mut turn_amount, mut back_off_time) =
            (self.back_off_speed, self.turn_amount, self.back_off_time);
        positive_param(params, "back_off_speed", &mut back_off_speed)?;
        positive_param(params, "turn_amount", &mut turn_amount)?;
        duration_param(params, "back_off_time", &mut back_off_time)?;
        self.back_off_speed = back_off_speed;
        self.turn_amount = turn_amount;
        self.back_off_time = back_off_time;
        Ok(())
    }

    fn reset(&mut self) {
        self.maneuver = None;
    }
}
