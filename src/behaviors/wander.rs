//! Wandering: turn away from what is ahead and keep moving

use super::{non_negative_param, positive_param, Action, ActionDesired, ActionResult};
use crate::common::units::{Degrees, Mm, MmPerSec};
use crate::error::{ActionError, Result};
use crate::perception::RobotState;
use std::collections::HashMap;

// Turning never drops below this share of the turn amount while avoiding
const MIN_TURN_FRACTION: f64 = 0.25;

/// Turns away from obstacles inside a forward cone
#[derive(Debug)]
pub struct AvoidFront {
    name: String,
    obstacle_distance: Mm,
    avoid_speed: MmPerSec,
    turn_amount: Degrees,
    half_width: Degrees,
    /// +1 turning left, -1 turning right, kept while the obstacle persists
    turn_sign: Option<f64>,
}

impl AvoidFront {
    pub fn new(name: &str, obstacle_distance: Mm, avoid_speed: MmPerSec, turn_amount: Degrees) -> Self {
        AvoidFront {
            name: name.to_string(),
            obstacle_distance,
            avoid_speed,
            turn_amount,
            half_width: 45.0,
            turn_sign: None,
        }
    }
}

impl Default for AvoidFront {
    fn default() -> Self {
        AvoidFront::new("avoid front far", 450.0, 200.0, 15.0)
    }
}

impl Action for AvoidFront {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        let range = match state.closest_in_arc(-self.half_width, self.half_width) {
            Some(reading) if reading.range < self.obstacle_distance => reading.range,
            _ => {
                self.turn_sign = None;
                return Ok(ActionResult::Pass);
            }
        };

        let sign = *self.turn_sign.get_or_insert_with(|| {
            let left = state
                .closest_in_arc(0.0, 90.0)
                .map_or(f64::INFINITY, |r| r.range);
            let right = state
                .closest_in_arc(-90.0, 0.0)
                .map_or(f64::INFINITY, |r| r.range);
            if left >= right {
                1.0
            } else {
                -1.0
            }
        });

        let closeness = ((self.obstacle_distance - range.max(0.0)) / self.obstacle_distance)
            .clamp(MIN_TURN_FRACTION, 1.0);
        Ok(ActionResult::Desire(
            ActionDesired::new()
                .translation(self.avoid_speed)
                .heading_delta(sign * self.turn_amount * closeness),
        ))
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let (mut obstacle_distance, mut avoid_speed) = (self.obstacle_distance, self.avoid_speed);
        let (mut turn_amount, mut half_width) = (self.turn_amount, self.half_width);
        positive_param(params, "obstacle_distance", &mut obstacle_distance)?;
        non_negative_param(params, "avoid_speed", &mut avoid_speed)?;
        positive_param(params, "turn_amount", &mut turn_amount)?;
        positive_param(params, "half_width", &mut half_width)?;
        self.obstacle_distance = obstacle_distance;
        self.avoid_speed = avoid_speed;
        self.turn_amount = turn_amount;
        self.half_width = half_width;
        Ok(())
    }

    fn reset(&mut self) {
        self.turn_sign = None;
    }
}

/// Always asks for the same forward speed
#[derive(Debug)]
pub struct ConstantVelocity {
    name: String,
    speed: MmPerSec,
}

impl ConstantVelocity {
    pub fn new(name: &str, speed: MmPerSec) -> Self {
        ConstantVelocity {
            name: name.to_string(),
            speed,
        }
    }
}

impl Action for ConstantVelocity {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&mut self, _state: &RobotState) -> std::result::Result<ActionResult, ActionError> {
        // straight ahead unless something above wants a turn
        Ok(ActionResult::Desire(
            ActionDesired::new().translation(self.speed).heading_delta(0.0),
        ))
    }

    fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        positive_param(params, "speed", &mut self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Field;
    use crate::perception::sensors::{RangeReading, RangeScan};
    use crate::perception::RobotSnapshot;

    fn scan(readings: &[(f64, f64)]) -> RobotState {
        RobotState::new(RobotSnapshot {
            ranges: RangeScan::new(
                readings
                    .iter()
                    .map(|&(bearing, range)| RangeReading { bearing, range })
                    .collect(),
            ),
            ..RobotSnapshot::default()
        })
    }

    fn heading(result: ActionResult) -> f64 {
        match result {
            ActionResult::Desire(d) => d.field(Field::HeadingDelta).unwrap().value,
            ActionResult::Pass => panic!("expected a turn"),
        }
    }

    #[test]
    fn clear_path_passes() {
        let mut avoid = AvoidFront::default();
        assert_eq!(avoid.fire(&scan(&[(0.0, 2000.0)])).unwrap(), ActionResult::Pass);
    }

    #[test]
    fn turns_toward_open_side_harder_when_closer() {
        let mut avoid = AvoidFront::default();
        // wall on the left, room on the right
        let far = heading(avoid.fire(&scan(&[(10.0, 400.0), (60.0, 300.0), (-60.0, 1500.0)])).unwrap());
        let near = heading(avoid.fire(&scan(&[(10.0, 100.0), (60.0, 300.0), (-60.0, 1500.0)])).unwrap());
        assert!(far < 0.0);
        assert!(near < far);
        assert!(near >= -15.0);
    }

    #[test]
    fn keeps_turn_direction_until_clear() {
        let mut avoid = AvoidFront::default();
        let first = heading(avoid.fire(&scan(&[(-10.0, 300.0), (-60.0, 200.0)])).unwrap());
        assert!(first > 0.0);
        // room flips to the left side but the turn is kept
        let second = heading(avoid.fire(&scan(&[(-10.0, 300.0), (60.0, 200.0)])).unwrap());
        assert!(second > 0.0);

        avoid.fire(&scan(&[])).unwrap();
        let third = heading(avoid.fire(&scan(&[(10.0, 300.0), (60.0, 200.0)])).unwrap());
        assert!(third < 0.0);
    }

    #[test]
    fn constant_velocity_is_not_exclusive() {
        let mut constant = ConstantVelocity::new("cv", 400.0);
        match constant.fire(&RobotState::default()).unwrap() {
            ActionResult::Desire(d) => {
                let t = d.field(Field::Translation).unwrap();
                assert_eq!(t.value, 400.0);
                assert!(!t.exclusive);
            }
            ActionResult::Pass => panic!("constant velocity always contributes"),
        }
    }

    #[test]
    fn failed_configuration_changes_nothing() {
        let mut avoid = AvoidFront::default();
        let mut params = HashMap::new();
        params.insert("obstacle_distance".to_string(), 900.0);
        params.insert("half_width".to_string(), 0.0);
        assert!(avoid.configure(&params).is_err());
        assert_eq!(avoid.obstacle_distance, 450.0);

        params.insert("half_width".to_string(), 30.0);
        avoid.configure(&params).unwrap();
        assert_eq!(avoid.obstacle_distance, 900.0);
        assert_eq!(avoid.half_width, 30.0);
    }
}
