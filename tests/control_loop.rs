use prometheus_arbiter::input::{InputEvent, InputQueue, KeyCode};
use prometheus_arbiter::lifecycle::{LifecycleNode, State};
use prometheus_arbiter::transport::{Obstacle, SimConfig, SimulatedRobot, TcpRobot};
use prometheus_arbiter::{
    Command, ControlLoop, CoreError, Mode, ModeController, Result, RobotSnapshot, RobotTransport,
    ShutdownHandle,
};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

/// Feeds empty snapshots, optionally failing or asking for shutdown after some steps
#[derive(Default)]
struct Scripted {
    steps: u64,
    fail_after: Option<u64>,
    shutdown_after: Option<(u64, ShutdownHandle)>,
    sent: Vec<Command>,
}

impl RobotTransport for Scripted {
    fn target(&self) -> String {
        "scripted".to_string()
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn enable_motors(&mut self) -> Result<()> {
        Ok(())
    }

    fn step_synchronously(&mut self) -> Result<RobotSnapshot> {
        self.steps += 1;
        if self.fail_after.is_some_and(|n| self.steps > n) {
            return Err(CoreError::Transport("link dropped".to_string()));
        }
        if let Some((n, shutdown)) = &self.shutdown_after {
            if self.steps > *n {
                shutdown.request();
            }
        }
        Ok(RobotSnapshot {
            timestamp: Duration::from_millis(100 * self.steps),
            ..RobotSnapshot::default()
        })
    }

    fn send_command(&mut self, command: &Command) -> Result<()> {
        self.sent.push(*command);
        Ok(())
    }
}

fn modes(mode: Mode) -> Arc<ModeController> {
    let modes = ModeController::standard(false).quiet();
    modes.activate(mode).unwrap();
    Arc::new(modes)
}

fn active<T: RobotTransport>(control: &mut ControlLoop<T>) {
    control.on_configure().unwrap();
    control.on_activate().unwrap();
    assert_eq!(control.state(), State::Active);
}

#[test]
fn run_needs_an_active_loop() {
    let mut control = ControlLoop::new(Scripted::default(), modes(Mode::Wander), InputQueue::new());
    assert!(matches!(
        control.run(),
        Err(CoreError::InvalidTransition { .. })
    ));
    assert!(control.transport().sent.is_empty());
}

#[test]
fn shutdown_stops_without_a_further_command() {
    let shutdown = ShutdownHandle::new();
    let transport = Scripted {
        shutdown_after: Some((5, shutdown.clone())),
        ..Scripted::default()
    };
    let mut control = ControlLoop::new(transport, modes(Mode::Wander), InputQueue::new())
        .with_shutdown(shutdown);
    active(&mut control);

    // the sixth step asks to stop before its command goes out
    assert_eq!(control.run().unwrap(), 5);
    assert_eq!(control.transport().sent.len(), 5);
    assert!(control.transport().sent.iter().all(|c| c.translation == 400.0));
}

#[test]
fn transport_failure_ends_the_loop() {
    let transport = Scripted {
        fail_after: Some(3),
        ..Scripted::default()
    };
    let mut control = ControlLoop::new(transport, modes(Mode::Wander), InputQueue::new());
    active(&mut control);

    assert!(matches!(control.run(), Err(CoreError::Transport(_))));
    assert_eq!(control.cycles(), 3);
}

#[test]
fn queued_keys_reach_keydrive() {
    let queue = InputQueue::new();
    let mut control = ControlLoop::new(Scripted::default(), modes(Mode::Teleoperation), queue.clone());
    active(&mut control);

    queue.push(InputEvent::Key(KeyCode::Up));
    queue.push(InputEvent::Key(KeyCode::Up));
    let command = control.step().unwrap().unwrap();
    assert_eq!(command.translation, 50.0);

    // the queue was drained; keydrive keeps its speed
    let command = control.step().unwrap().unwrap();
    assert_eq!(command.translation, 50.0);

    queue.push(InputEvent::Key(KeyCode::Space));
    assert_eq!(control.step().unwrap().unwrap().translation, 0.0);
}

#[test]
fn cleanup_is_refused_while_active() {
    let mut control = ControlLoop::new(Scripted::default(), modes(Mode::Wander), InputQueue::new());
    active(&mut control);
    assert!(control.on_cleanup().is_err());

    control.on_deactivate().unwrap();
    assert!(control.shutdown_handle().is_requested());
    control.on_cleanup().unwrap();
    assert_eq!(control.state(), State::Unconfigured);
}

#[test]
fn unreachable_robot_fails_configuration() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let robot = TcpRobot::new("127.0.0.1", port).with_timeout(Duration::from_millis(200));
    let mut control = ControlLoop::new(robot, modes(Mode::Wander), InputQueue::new());
    assert!(matches!(
        control.on_configure(),
        Err(CoreError::ConnectionFailed { .. })
    ));
    assert_eq!(control.state(), State::Unconfigured);
}

#[test]
fn wandering_robot_turns_away_from_a_wall() {
    let robot = SimulatedRobot::new(SimConfig::default())
        .with_obstacle(Obstacle::wall(1500.0, -3000.0, 1500.0, 3000.0))
        .place(0.0, 200.0, 0.0);
    let mut control = ControlLoop::new(robot, modes(Mode::Wander), InputQueue::new());
    active(&mut control);

    for _ in 0..150 {
        control.step().unwrap();
    }
    let sim = control.transport();
    assert_eq!(sim.commands_received(), 150);
    // it moved, and never drove through the wall
    let (x, y) = sim.position();
    assert!(x.hypot(y - 200.0) > 500.0);
    assert!(x <= 1500.0 - 250.0);
    assert!(sim.heading().abs() > 10.0);
}

#[test]
fn teleop_takes_over_from_wander_at_a_standstill() {
    let modes = modes(Mode::Wander);
    let mut control = ControlLoop::new(Scripted::default(), Arc::clone(&modes), InputQueue::new());
    active(&mut control);

    assert_eq!(control.step().unwrap().unwrap().translation, 400.0);
    modes.activate(Mode::Teleoperation).unwrap();
    let command = control.step().unwrap().unwrap();
    assert_eq!(command.translation, 0.0);
    assert_eq!(command.heading_delta, 0.0);
}
