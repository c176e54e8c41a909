//! Perception module for Prometheus robot
pub mod sensors;

use self::sensors::{RangeDevice, RangeReading, RangeScan};
use crate::common::units::{Degrees, Mm, MmPerSec};
use crate::common::Command;
use crate::input::InputFrame;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bumper contacts, split by corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bumpers {
    pub front_left: bool,
    pub front_right: bool,
    pub rear_left: bool,
    pub rear_right: bool,
}

impl Bumpers {
    pub fn front(&self) -> bool {
        self.front_left || self.front_right
    }

    pub fn rear(&self) -> bool {
        self.rear_left || self.rear_right
    }

    pub fn any(&self) -> bool {
        self.front() || self.rear()
    }
}

/// What the robot reports after one synchronous step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    /// Robot clock at the end of the step
    pub timestamp: Duration,
    pub velocity: MmPerSec,
    pub rot_velocity: f64,
    pub heading: Degrees,
    pub ranges: RangeScan,
    /// Downward-facing IR distances; empty if the robot has no table sensors
    pub floor_ranges: Vec<Mm>,
    pub left_stalled: bool,
    pub right_stalled: bool,
    pub bumpers: Bumpers,
}

/// Everything an action may look at during one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotState {
    pub robot: RobotSnapshot,
    pub input: InputFrame,
    /// The command resolved on the previous cycle
    pub commanded: Command,
    /// Time since the control loop started
    pub elapsed: Duration,
}

impl RobotState {
    pub fn new(robot: RobotSnapshot) -> Self {
        RobotState {
            robot,
            ..RobotState::default()
        }
    }

    pub fn with_input(mut self, input: InputFrame) -> Self {
        self.input = input;
        self
    }

    pub fn with_commanded(mut self, commanded: Command) -> Self {
        self.commanded = commanded;
        self
    }

    pub fn at(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn stalled(&self) -> bool {
        self.robot.left_stalled || self.robot.right_stalled
    }

    pub fn closest_in_arc(&self, start: Degrees, end: Degrees) -> Option<RangeReading> {
        self.robot.ranges.closest_in_arc(start, end)
    }
}
