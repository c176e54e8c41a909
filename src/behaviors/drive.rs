//! Drive from operator input: joystick and keyboard

use super::{positive_param, Action, ActionDesired, ActionResult};
use crate::common::units::{Degrees, MmPerSec};
use crate::error::{ActionError, Result};
use crate::input::{JoystickSample, KeyCode};
use crate::perception::RobotState;
use std::collections::HashMap;

/// Drive from joystick samples
#[derive(Debug)]
pub struct JoyDrive {
    name: String,
    max_speed: MmPerSec,
    max_turn: Degrees,
    joystick_present: bool,
    stop_if_no_button: bool,
    last_sample: Option<JoystickSample>,
    driving: bool,
}

impl JoyDrive {
    pub fn new(name: &str, max_speed: MmPerSec, max_turn: Degrees, joystick_present: bool) -> Self {
        JoyDrive {
            name: name.to_string(),
            max_speed,
            max_turn,
            joystick_present,
            stop_if_no_button: true,
            last_sample: None,
            driving: false,
        }
    }

    /// Whether a joystick was found when the action was built
    pub fn joystick_inited(&self) -> bool {
        self.joystick_present
    }

    /// When false, the joystick has no effect unless the trigger is held
    pub fn set_stop_if_no_button_pressed(&mut self, stop: bool) {
        self.stop_if_no_button = stop;
    }
}

impl Action for JoyDrive {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        if !self.joystick_present {
            return Ok(ActionResult::Pass);
        }
        if let Some(sample) = state.input.joystick {
            self.last_sample = Some(sample);
        }
        let sample = match self.last_sample {
            Some(sample) => sample,
            None => return Ok(ActionResult::Pass),
        };
        if !(sample.x.is_finite() && sample.y.is_finite()) {
            return Err(ActionError::SensorUnavailable(
                "joystick reported a non-finite axis".to_string(),
            ));
        }

        if sample.trigger {
            self.driving = true;
            let speed = sample.y.clamp(-1.0, 1.0) * self.max_speed;
            let turn = sample.x.clamp(-1.0, 1.0) * self.max_turn;
            return Ok(ActionResult::Desire(
                ActionDesired::new().translation(speed).heading_delta(turn),
            ));
        }

        // releasing the trigger stops what the joystick started
        if self.stop_if_no_button || std::mem::take(&mut self.driving) {
            return Ok(ActionResult::Desire(
                ActionDesired::new().translation(0.0).heading_delta(0.0),
            ));
        }
        Ok(ActionResult::Pass)
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let (mut max_speed, mut max_turn) = (self.max_speed, self.max_turn);
        positive_param(params, "max_speed", &mut max_speed)?;
        positive_param(params, "max_turn", &mut max_turn)?;
        self.max_speed = max_speed;
        self.max_turn = max_turn;
        Ok(())
    }

    fn reset(&mut self) {
        self.last_sample = None;
        self.driving = false;
    }
}

/// Drive from the arrow keys: up/down step the speed, left/right turn, space stops
#[derive(Debug)]
pub struct KeyDrive {
    name: String,
    max_speed: MmPerSec,
    speed_increment: MmPerSec,
    turn_amount: Degrees,
    speed: MmPerSec,
    // last cycle asked for a turn; a held heading delta keeps turning
    turning: bool,
}

impl KeyDrive {
    pub fn new(
        name: &str,
        max_speed: MmPerSec,
        speed_increment: MmPerSec,
        turn_amount: Degrees,
    ) -> Self {
        KeyDrive {
            name: name.to_string(),
            max_speed,
            speed_increment,
            turn_amount,
            speed: 0.0,
            turning: false,
        }
    }

    pub fn speed(&self) -> MmPerSec {
        self.speed
    }
}

impl Default for KeyDrive {
    fn default() -> Self {
        KeyDrive::new("keydrive", 400.0, 25.0, 10.0)
    }
}

impl Action for KeyDrive {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        let mut turn = 0.0;
        let mut pressed = false;
        for key in &state.input.keys {
            match key {
                KeyCode::Up => self.speed += self.speed_increment,
                KeyCode::Down => self.speed -= self.speed_increment,
                KeyCode::Left => turn += self.turn_amount,
                KeyCode::Right => turn -= self.turn_amount,
                KeyCode::Space => {
                    self.speed = 0.0;
                    turn = 0.0;
                }
                _ => continue,
            }
            pressed = true;
        }
        self.speed = self.speed.clamp(-self.max_speed, self.max_speed);

        if !pressed && self.speed == 0.0 && !self.turning {
            return Ok(ActionResult::Pass);
        }
        self.turning = turn != 0.0;
        Ok(ActionResult::Desire(
            ActionDesired::new()
                .translation(self.speed)
                .heading_delta(turn),
        ))
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let (mut max_speed, mut speed_increment, mut turn_amount) =
            (self.max_speed, self.speed_increment, self.turn_amount);
        positive_param(params, "max_speed", &mut max_speed)?;
        positive_param(params, "speed_increment", &mut speed_increment)?;
        positive_param(params, "turn_amount", &mut turn_amount)?;
        self.max_speed = max_speed;
        self.speed_increment = speed_increment;
        self.turn_amount = turn_amount;
        Ok(())
    }

    fn reset(&mut self) {
        self.speed = 0.0;
        self.turning = false;
    }
}
