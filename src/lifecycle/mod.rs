//! Lifecycle management for Prometheus components

use crate::error::{CoreError, Result};
use std::fmt;
use tracing::info;

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send {
    /// Configure the node
    fn on_configure(&mut self) -> Result<()>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<()>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<()>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<()>;
}

/// Base implementation for lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Unconfigured => "unconfigured",
            State::Inactive => "inactive",
            State::Active => "active",
        };
        f.write_str(name)
    }
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Fail unless the node is currently in `expected`
    pub fn require(&self, expected: State, to: State) -> Result<()> {
        if self.state != expected {
            return Err(CoreError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Set the state
    pub fn set_state(&mut self, state: State) {
        if self.state != state {
            info!("{}: {} -> {}", self.name, self.state, state);
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_current_state() {
        let mut base = LifecycleNodeBase::new("node");
        assert!(base.require(State::Unconfigured, State::Inactive).is_ok());
        assert!(base.require(State::Inactive, State::Active).is_err());
        base.set_state(State::Inactive);
        assert_eq!(base.get_state(), State::Inactive);
    }
}
