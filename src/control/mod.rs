//! Control module for Prometheus robot
pub mod arbiter;
pub mod modes;

use self::arbiter::Arbiter;
use self::modes::ModeController;
use crate::common::Command;
use crate::error::{CoreError, Result};
use crate::input::InputQueue;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::perception::RobotState;
use crate::transport::RobotTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Flag shared with whoever may stop the control loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        ShutdownHandle::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The periodic loop: step the robot, resolve the active actions, send the command.
/// Pacing comes from the transport's synchronous step
pub struct ControlLoop<T: RobotTransport> {
    base: LifecycleNodeBase,
    transport: T,
    modes: Arc<ModeController>,
    arbiter: Arbiter,
    input: InputQueue,
    shutdown: ShutdownHandle,
    start: Option<Duration>,
    cycles: u64,
}

impl<T: RobotTransport> ControlLoop<T> {
    /// Create a new control loop
    pub fn new(transport: T, modes: Arc<ModeController>, input: InputQueue) -> Self {
        ControlLoop {
            base: LifecycleNodeBase::new("control_loop"),
            transport,
            modes,
            arbiter: Arbiter::new(),
            input,
            shutdown: ShutdownHandle::new(),
            start: None,
            cycles: 0,
        }
    }

    /// Use an externally created shutdown flag
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run one cycle. Returns `None` if shutdown was requested before a command went out
    pub fn step(&mut self) -> Result<Option<Command>> {
        if self.shutdown.is_requested() {
            return Ok(None);
        }
        let snapshot = self.transport.step_synchronously()?;
        let start = *self.start.get_or_insert(snapshot.timestamp);
        let elapsed = snapshot.timestamp.saturating_sub(start);

        let state = RobotState::new(snapshot)
            .with_input(self.input.drain())
            .with_commanded(self.arbiter.previous())
            .at(elapsed);
        let command = self.arbiter.resolve_active(&self.modes, &state);

        // nothing goes out once shutdown has begun
        if self.shutdown.is_requested() {
            return Ok(None);
        }
        self.transport.send_command(&command)?;
        self.cycles += 1;
        debug!(
            "cycle {}: {:?} from {:?}",
            self.cycles,
            command,
            self.arbiter.contributors()
        );
        Ok(Some(command))
    }

    /// Run until shutdown is requested or the transport fails
    pub fn run(&mut self) -> Result<u64> {
        self.base.require(State::Active, State::Active)?;
        info!("Control loop running against {}", self.transport.target());
        loop {
            match self.step() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    error!("Lost the robot: {}", e);
                    return Err(e);
                }
            }
        }
        info!("Control loop stopped after {} cycles", self.cycles);
        Ok(self.cycles)
    }
}

impl<T: RobotTransport> LifecycleNode for ControlLoop<T> {
    fn on_configure(&mut self) -> Result<()> {
        self.base.require(State::Unconfigured, State::Inactive)?;
        self.transport.connect()?;
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        self.base.require(State::Inactive, State::Active)?;
        self.transport.enable_motors()?;
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        self.shutdown.request();
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        if self.base.get_state() == State::Active {
            return Err(CoreError::InvalidTransition {
                from: State::Active.to_string(),
                to: State::Unconfigured.to_string(),
            });
        }
        self.transport.disconnect();
        self.base.set_state(State::Unconfigured);
        Ok(())
    }
}
