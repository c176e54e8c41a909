//! Behaviour arbitration for the Prometheus robot
//!
//! Independent motion actions are grouped into modes; each control cycle the
//! arbiter merges the active group's contributions by priority into a single
//! command, and the mode controller switches groups atomically from any thread.
pub mod behaviors;
pub mod common;
pub mod control;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod perception;
pub mod transport;

pub use crate::behaviors::{Action, ActionDesired, ActionGroup, ActionResult};
pub use crate::common::Command;
pub use crate::control::arbiter::Arbiter;
pub use crate::control::modes::{Activation, Mode, ModeController};
pub use crate::control::{ControlLoop, ShutdownHandle};
pub use crate::error::{ActionError, CoreError, Result};
pub use crate::perception::{RobotSnapshot, RobotState};
pub use crate::transport::RobotTransport;
