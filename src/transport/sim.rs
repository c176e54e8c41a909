//! In-process kinematic simulator standing in for a robot base
//!
//! A round differential-drive robot in a world of circular obstacles and
//! walls, with a sonar ring, four bumper corners and stall detection when the
//! robot pushes into something.

use super::RobotTransport;
use crate::common::units::{Degrees, Mm};
use crate::common::{normalize_degrees, Command};
use crate::error::{CoreError, Result};
use crate::perception::sensors::{RangeReading, RangeScan};
use crate::perception::{Bumpers, RobotSnapshot};
use nalgebra::{Point2, Vector2};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

// Bumpers close a little before the body touches
const CONTACT_MARGIN: Mm = 10.0;

/// Something the robot can run into
#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    Circle { center: Point2<f64>, radius: Mm },
    Wall { start: Point2<f64>, end: Point2<f64> },
}

impl Obstacle {
    pub fn circle(x: Mm, y: Mm, radius: Mm) -> Self {
        Obstacle::Circle {
            center: Point2::new(x, y),
            radius,
        }
    }

    pub fn wall(x1: Mm, y1: Mm, x2: Mm, y2: Mm) -> Self {
        Obstacle::Wall {
            start: Point2::new(x1, y1),
            end: Point2::new(x2, y2),
        }
    }

    /// Closest point of the obstacle's surface to `p`
    fn closest_point(&self, p: &Point2<f64>) -> Point2<f64> {
        match self {
            Obstacle::Circle { center, radius } => {
                let offset = p - center;
                let norm = offset.norm();
                if norm < f64::EPSILON {
                    center + Vector2::new(*radius, 0.0)
                } else {
                    center + offset * (*radius / norm)
                }
            }
            Obstacle::Wall { start, end } => {
                let along = end - start;
                let len2 = along.norm_squared();
                let t = if len2 == 0.0 {
                    0.0
                } else {
                    ((p - start).dot(&along) / len2).clamp(0.0, 1.0)
                };
                start + along * t
            }
        }
    }

    /// Distance from `p` to the obstacle's surface, zero inside
    fn distance(&self, p: &Point2<f64>) -> Mm {
        match self {
            Obstacle::Circle { center, radius } => ((p - center).norm() - radius).max(0.0),
            Obstacle::Wall { .. } => (p - self.closest_point(p)).norm(),
        }
    }

    /// Distance along a unit ray to the first hit
    fn ray_hit(&self, origin: &Point2<f64>, dir: &Vector2<f64>) -> Option<Mm> {
        match self {
            Obstacle::Circle { center, radius } => {
                let oc = origin - center;
                let b = oc.dot(dir);
                let c = oc.norm_squared() - radius * radius;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let root = disc.sqrt();
                if -b - root >= 0.0 {
                    Some(-b - root)
                } else if -b + root >= 0.0 {
                    // origin is inside the circle
                    Some(0.0)
                } else {
                    None
                }
            }
            Obstacle::Wall { start, end } => {
                let v1 = origin - start;
                let v2 = end - start;
                let v3 = Vector2::new(-dir.y, dir.x);
                let denom = v2.dot(&v3);
                if denom.abs() < f64::EPSILON {
                    return None;
                }
                let t = (v2.x * v1.y - v2.y * v1.x) / denom;
                let s = v1.dot(&v3) / denom;
                (t >= 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
            }
        }
    }
}

/// Simulator parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Length of one synchronous step
    pub period: Duration,
    /// Sleep for `period` on every step
    pub realtime: bool,
    pub robot_radius: Mm,
    pub sonar_bearings: Vec<Degrees>,
    pub max_range: Mm,
    /// deg/s
    pub max_rot_velocity: f64,
    /// Rotational velocity per degree of heading delta, 1/s
    pub turn_gain: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            period: Duration::from_millis(100),
            realtime: false,
            robot_radius: 250.0,
            sonar_bearings: vec![
                90.0, 50.0, 30.0, 10.0, -10.0, -30.0, -50.0, -90.0, -130.0, -150.0, -170.0,
                170.0, 150.0, 130.0,
            ],
            max_range: 5000.0,
            max_rot_velocity: 100.0,
            turn_gain: 2.0,
        }
    }
}

/// A simulated robot implementing [`RobotTransport`]
#[derive(Debug)]
pub struct SimulatedRobot {
    config: SimConfig,
    obstacles: Vec<Obstacle>,
    position: Point2<f64>,
    heading: Degrees,
    velocity: f64,
    rot_velocity: f64,
    command: Command,
    commands_received: u64,
    connected: bool,
    motors_enabled: bool,
    clock: Duration,
}

impl SimulatedRobot {
    pub fn new(config: SimConfig) -> Self {
        SimulatedRobot {
            config,
            obstacles: Vec::new(),
            position: Point2::origin(),
            heading: 0.0,
            velocity: 0.0,
            rot_velocity: 0.0,
            command: Command::stop(),
            commands_received: 0,
            connected: false,
            motors_enabled: false,
            clock: Duration::ZERO,
        }
    }

    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// Surround the origin with a rectangular room
    pub fn with_arena(self, half_width: Mm, half_height: Mm) -> Self {
        let (w, h) = (half_width, half_height);
        self.with_obstacle(Obstacle::wall(-w, -h, w, -h))
            .with_obstacle(Obstacle::wall(w, -h, w, h))
            .with_obstacle(Obstacle::wall(w, h, -w, h))
            .with_obstacle(Obstacle::wall(-w, h, -w, -h))
    }

    /// A walled room with a few posts, used by the binaries
    pub fn demo(config: SimConfig) -> Self {
        SimulatedRobot::new(config)
            .with_arena(4000.0, 3000.0)
            .with_obstacle(Obstacle::circle(1800.0, 600.0, 300.0))
            .with_obstacle(Obstacle::circle(-1500.0, -1200.0, 400.0))
            .with_obstacle(Obstacle::circle(500.0, -1800.0, 250.0))
    }

    /// Move the robot
    pub fn place(mut self, x: Mm, y: Mm, heading: Degrees) -> Self {
        self.position = Point2::new(x, y);
        self.heading = normalize_degrees(heading);
        self
    }

    pub fn position(&self) -> (Mm, Mm) {
        (self.position.x, self.position.y)
    }

    pub fn heading(&self) -> Degrees {
        self.heading
    }

    pub fn last_command(&self) -> Command {
        self.command
    }

    pub fn commands_received(&self) -> u64 {
        self.commands_received
    }

    pub fn motors_enabled(&self) -> bool {
        self.motors_enabled
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn direction(&self, bearing: Degrees) -> Vector2<f64> {
        let angle = (self.heading + bearing).to_radians();
        Vector2::new(angle.cos(), angle.sin())
    }

    fn sonar(&self) -> RangeScan {
        let readings = self
            .config
            .sonar_bearings
            .iter()
            .map(|&bearing| {
                let dir = self.direction(bearing);
                let hit = self
                    .obstacles
                    .iter()
                    .filter_map(|o| o.ray_hit(&self.position, &dir))
                    .fold(f64::INFINITY, f64::min);
                let range = (hit - self.config.robot_radius)
                    .max(0.0)
                    .min(self.config.max_range);
                RangeReading { bearing, range }
            })
            .collect();
        RangeScan::new(readings)
    }

    fn contacts(&self) -> Bumpers {
        let mut bumpers = Bumpers::default();
        for obstacle in &self.obstacles {
            if obstacle.distance(&self.position) > self.config.robot_radius + CONTACT_MARGIN {
                continue;
            }
            let offset = obstacle.closest_point(&self.position) - self.position;
            let bearing = normalize_degrees(offset.y.atan2(offset.x).to_degrees() - self.heading);
            match bearing {
                b if (0.0..=90.0).contains(&b) => bumpers.front_left = true,
                b if (-90.0..0.0).contains(&b) => bumpers.front_right = true,
                b if b > 90.0 => bumpers.rear_left = true,
                _ => bumpers.rear_right = true,
            }
        }
        bumpers
    }

    fn integrate(&mut self) -> bool {
        let dt = self.config.period.as_secs_f64();
        let (target, turn) = if self.motors_enabled {
            (self.command.translation, self.command.heading_delta)
        } else {
            (0.0, 0.0)
        };

        let accel = self.command.translation_accel.max(1.0) * dt;
        self.velocity += (target - self.velocity).clamp(-accel, accel);
        self.rot_velocity = (turn * self.config.turn_gain)
            .clamp(-self.config.max_rot_velocity, self.config.max_rot_velocity);
        self.heading = normalize_degrees(self.heading + self.rot_velocity * dt);

        let proposed = self.position + self.direction(0.0) * (self.velocity * dt);
        let radius = self.config.robot_radius;
        // pushing further into something stalls the wheels
        let blocked = self.obstacles.iter().any(|o| {
            let next = o.distance(&proposed);
            next < radius && next < o.distance(&self.position)
        });
        if blocked {
            self.velocity = 0.0;
        } else {
            self.position = proposed;
        }
        blocked
    }
}

impl Default for SimulatedRobot {
    fn default() -> Self {
        SimulatedRobot::new(SimConfig::default())
    }
}

impl RobotTransport for SimulatedRobot {
    fn target(&self) -> String {
        "simulator".to_string()
    }

    fn connect(&mut self) -> Result<()> {
        info!("Connected to simulated robot");
        self.connected = true;
        Ok(())
    }

    fn enable_motors(&mut self) -> Result<()> {
        if !self.connected {
            return Err(CoreError::NotConnected);
        }
        self.motors_enabled = true;
        Ok(())
    }

    fn step_synchronously(&mut self) -> Result<RobotSnapshot> {
        if !self.connected {
            return Err(CoreError::NotConnected);
        }
        if self.config.realtime {
            thread::sleep(self.config.period);
        }
        let stalled = self.integrate();
        self.clock += self.config.period;
        if stalled {
            debug!("Simulated robot stalled at {:?}", self.position());
        }

        Ok(RobotSnapshot {
            timestamp: self.clock,
            velocity: self.velocity,
            rot_velocity: self.rot_velocity,
            heading: self.heading,
            ranges: self.sonar(),
            floor_ranges: Vec::new(),
            left_stalled: stalled,
            right_stalled: stalled,
            bumpers: self.contacts(),
        })
    }

    fn send_command(&mut self, command: &Command) -> Result<()> {
        if !self.connected {
            return Err(CoreError::NotConnected);
        }
        self.command = *command;
        self.commands_received += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.motors_enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(robot: SimulatedRobot) -> SimulatedRobot {
        let mut robot = robot;
        robot.connect().unwrap();
        robot.enable_motors().unwrap();
        robot
    }

    #[test]
    fn ray_hits_wall_in_front() {
        let wall = Obstacle::wall(5.0, -1.0, 5.0, 1.0);
        let hit = wall.ray_hit(&Point2::origin(), &Vector2::new(1.0, 0.0));
        assert!((hit.unwrap() - 5.0).abs() < 1e-9);
        assert!(wall
            .ray_hit(&Point2::origin(), &Vector2::new(-1.0, 0.0))
            .is_none());
    }

    #[test]
    fn ray_hits_circle_surface() {
        let circle = Obstacle::circle(1000.0, 0.0, 100.0);
        let hit = circle.ray_hit(&Point2::origin(), &Vector2::new(1.0, 0.0));
        assert!((hit.unwrap() - 900.0).abs() < 1e-9);
    }

    #[test]
    fn sonar_measures_from_the_body() {
        let mut robot = connected(SimulatedRobot::default().with_obstacle(Obstacle::wall(
            1000.0, -2000.0, 1000.0, 2000.0,
        )));
        let snapshot = robot.step_synchronously().unwrap();
        let front = snapshot
            .ranges
            .readings
            .iter()
            .find(|r| r.bearing == 10.0)
            .unwrap();
        // 1000 / cos(10deg) minus the 250 mm radius
        assert!((front.range - (1000.0 / 10f64.to_radians().cos() - 250.0)).abs() < 1e-6);
    }

    #[test]
    fn robot_accelerates_toward_command() {
        let mut robot = connected(SimulatedRobot::default());
        robot
            .send_command(&Command {
                translation: 400.0,
                heading_delta: 0.0,
                translation_accel: 1000.0,
            })
            .unwrap();
        let first = robot.step_synchronously().unwrap();
        assert_eq!(first.velocity, 100.0);
        for _ in 0..5 {
            robot.step_synchronously().unwrap();
        }
        assert_eq!(robot.step_synchronously().unwrap().velocity, 400.0);
        assert!(robot.position().0 > 0.0);
    }

    #[test]
    fn driving_into_a_wall_stalls_and_bumps() {
        let mut robot = connected(
            SimulatedRobot::default()
                .with_obstacle(Obstacle::wall(255.0, -1000.0, 255.0, 1000.0)),
        );
        robot
            .send_command(&Command {
                translation: 200.0,
                heading_delta: 0.0,
                translation_accel: 1000.0,
            })
            .unwrap();
        let snapshot = robot.step_synchronously().unwrap();
        assert!(snapshot.left_stalled && snapshot.right_stalled);
        assert!(snapshot.bumpers.front());
        assert_eq!(snapshot.velocity, 0.0);
    }

    #[test]
    fn stepping_requires_a_connection() {
        let mut robot = SimulatedRobot::default();
        assert!(matches!(
            robot.step_synchronously(),
            Err(CoreError::NotConnected)
        ));
    }
}
