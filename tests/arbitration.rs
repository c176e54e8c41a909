use prometheus_arbiter::behaviors::limiters::ForwardsLimiter;
use prometheus_arbiter::behaviors::wander::ConstantVelocity;
use prometheus_arbiter::common::DEFAULT_TRANSLATION_ACCEL;
use prometheus_arbiter::error::ActionError;
use prometheus_arbiter::perception::sensors::{RangeReading, RangeScan};
use prometheus_arbiter::{
    Action, ActionDesired, ActionGroup, ActionResult, Arbiter, Command, RobotSnapshot, RobotState,
};
use std::time::Duration;

/// Contributes a fixed desire every cycle
struct Fixed {
    name: &'static str,
    desired: ActionDesired,
}

impl Action for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    fn fire(&mut self, _state: &RobotState) -> Result<ActionResult, ActionError> {
        Ok(ActionResult::Desire(self.desired))
    }
}

fn fixed(name: &'static str, desired: ActionDesired) -> Fixed {
    Fixed { name, desired }
}

fn obstacle_ahead(range: f64) -> RobotState {
    RobotState::new(RobotSnapshot {
        ranges: RangeScan::new(vec![
            RangeReading {
                bearing: 0.0,
                range,
            },
            RangeReading {
                bearing: 180.0,
                range: 5000.0,
            },
        ]),
        ..RobotSnapshot::default()
    })
}

fn limited_drive() -> ActionGroup {
    let mut group = ActionGroup::new("limited");
    group
        .add_action(ForwardsLimiter::new("limiter", 300.0, 600.0, 250.0), 90)
        .add_action(ConstantVelocity::new("drive", 400.0), 50);
    group
}

#[test]
fn limiter_slows_drive_between_thresholds() {
    let group = limited_drive();
    let mut arbiter = Arbiter::new();

    let command = arbiter.resolve(Some(&group), &obstacle_ahead(450.0));
    assert!(command.translation > 0.0 && command.translation < 400.0);
    assert!((command.translation - 125.0).abs() < 1e-9);
    assert_eq!(arbiter.contributors(), ["limiter", "drive"]);
}

#[test]
fn limiter_stops_drive_inside_stop_distance() {
    let group = limited_drive();
    let mut arbiter = Arbiter::new();

    let command = arbiter.resolve(Some(&group), &obstacle_ahead(250.0));
    assert_eq!(command.translation, 0.0);
}

#[test]
fn limiter_result_does_not_depend_on_insertion_order() {
    let mut group = ActionGroup::new("reversed");
    group
        .add_action(ConstantVelocity::new("drive", 400.0), 50)
        .add_action(ForwardsLimiter::new("limiter", 300.0, 600.0, 250.0), 90);
    let mut arbiter = Arbiter::new();

    let command = arbiter.resolve(Some(&group), &obstacle_ahead(450.0));
    assert!((command.translation - 125.0).abs() < 1e-9);
}

#[test]
fn clear_path_lets_drive_through() {
    let group = limited_drive();
    let mut arbiter = Arbiter::new();

    let command = arbiter.resolve(Some(&group), &obstacle_ahead(3000.0));
    assert_eq!(command.translation, 400.0);
    assert_eq!(arbiter.contributors(), ["drive"]);
}

#[test]
fn ties_go_to_the_first_inserted() {
    let mut group = ActionGroup::new("ties");
    group
        .add_action(fixed("first", ActionDesired::new().heading_delta(10.0)), 50)
        .add_action(fixed("second", ActionDesired::new().heading_delta(-10.0)), 50);
    let mut arbiter = Arbiter::new();

    let command = arbiter.resolve(Some(&group), &RobotState::default());
    assert_eq!(command.heading_delta, 10.0);
}

#[test]
fn exclusive_higher_priority_value_always_wins() {
    for low_priority in [0, 10, 49] {
        let mut group = ActionGroup::new("exclusive");
        group
            .add_action(
                fixed("low", ActionDesired::new().translation(400.0).max_forward(0.0)),
                low_priority,
            )
            .add_action(
                fixed("high", ActionDesired::new().exclusive_translation(100.0)),
                50,
            );
        let mut arbiter = Arbiter::new();

        let command = arbiter.resolve(Some(&group), &RobotState::default());
        assert_eq!(command.translation, 100.0);
    }
}

#[test]
fn stall_recovery_overrides_wandering() {
    let group = ActionGroup::wander();
    let mut arbiter = Arbiter::new();

    let cruising = arbiter.resolve(Some(&group), &obstacle_ahead(4000.0));
    assert_eq!(cruising.translation, 400.0);

    let stalled = RobotState::new(RobotSnapshot {
        left_stalled: true,
        ..obstacle_ahead(4000.0).robot
    })
    .at(Duration::from_millis(100));
    let command = arbiter.resolve(Some(&group), &stalled);
    assert!(command.translation < 0.0);
    assert_ne!(command.heading_delta, 0.0);
    assert_eq!(arbiter.contributors().first().map(String::as_str), Some("stall recover"));
}

#[test]
fn empty_group_holds_the_previous_command() {
    let mut arbiter = Arbiter::new();
    let first = arbiter.resolve(None, &RobotState::default());
    assert_eq!(first, Command::stop());
    assert_eq!(first.translation_accel, DEFAULT_TRANSLATION_ACCEL);

    let group = limited_drive();
    arbiter.resolve(Some(&group), &obstacle_ahead(3000.0));
    let empty = ActionGroup::new("empty");
    assert_eq!(arbiter.resolve(Some(&empty), &RobotState::default()).translation, 400.0);
}

struct Panicky;

impl Action for Panicky {
    fn name(&self) -> &str {
        "panicky"
    }

    fn fire(&mut self, _state: &RobotState) -> Result<ActionResult, ActionError> {
        panic!("sensor driver exploded");
    }
}

#[test]
fn faulting_actions_are_skipped() {
    let mut group = ActionGroup::new("faults");
    group
        .add_action(Panicky, 100)
        .add_action(fixed("nan", ActionDesired::new().translation(f64::NAN)), 90)
        .add_action(fixed("drive", ActionDesired::new().translation(200.0)), 10);
    let mut arbiter = Arbiter::new();

    let command = arbiter.resolve(Some(&group), &RobotState::default());
    assert_eq!(command.translation, 200.0);
    assert_eq!(arbiter.faults(), 2);
    assert_eq!(arbiter.contributors(), ["drive"]);
}
