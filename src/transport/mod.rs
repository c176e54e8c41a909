//! Robot connection: the motor/transport interface the control loop drives
pub mod sim;
pub mod tcp;

use crate::common::Command;
use crate::error::Result;
use crate::perception::RobotSnapshot;

pub use self::sim::{Obstacle, SimConfig, SimulatedRobot};
pub use self::tcp::TcpRobot;

/// Connection to a robot base
pub trait RobotTransport: Send {
    /// Human-readable description of what we connect to
    fn target(&self) -> String;

    /// Open the connection
    fn connect(&mut self) -> Result<()>;

    /// Turn the motors on
    fn enable_motors(&mut self) -> Result<()>;

    /// Block until the robot's next cycle and return its state
    fn step_synchronously(&mut self) -> Result<RobotSnapshot>;

    /// Send the resolved command for this cycle
    fn send_command(&mut self, command: &Command) -> Result<()>;

    /// Close the connection
    fn disconnect(&mut self) {}
}

impl<T: RobotTransport + ?Sized> RobotTransport for Box<T> {
    fn target(&self) -> String {
        (**self).target()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn enable_motors(&mut self) -> Result<()> {
        (**self).enable_motors()
    }

    fn step_synchronously(&mut self) -> Result<RobotSnapshot> {
        (**self).step_synchronously()
    }

    fn send_command(&mut self, command: &Command) -> Result<()> {
        (**self).send_command(command)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
