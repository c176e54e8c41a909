//! Error types for the Prometheus arbiter

use thiserror::Error;

/// Errors surfaced by the control core and its transports
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("could not connect to the robot at {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("robot is not connected")]
    NotConnected,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("no action named '{0}' in the group")]
    UnknownAction(String),

    #[error("no action group registered for mode {0}")]
    UnknownMode(String),

    #[error("lifecycle transition from {from} to {to} is not allowed")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// A fault raised while an action evaluates; the arbiter degrades it to "no contribution"
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("sensor data unavailable: {0}")]
    SensorUnavailable(String),

    #[error("{0}")]
    Fault(String),
}

impl CoreError {
    pub(crate) fn invalid_parameter(name: &str, reason: &str) -> Self {
        CoreError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
