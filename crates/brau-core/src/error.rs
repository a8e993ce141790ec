//! Error types for the control engine.

use crate::hal::{AnalogChannel, DigitalLine};
use crate::vessel::Vessel;
use std::time::Duration;
use thiserror::Error;

/// Result type for control engine operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Failures reported by (or on behalf of) the DAQ device.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeviceError {
    #[error("device is not connected")]
    NotConnected,

    #[error("failed to connect to device: {reason}")]
    ConnectFailed { reason: String },

    #[error("analog read on channel {} failed: {reason}", .channel.index())]
    ReadFailed {
        channel: AnalogChannel,
        reason: String,
    },

    #[error("digital write on line {} failed: {reason}", .line.index())]
    WriteFailed { line: DigitalLine, reason: String },

    #[error("voltage {voltage:.3} V is outside the thermistor range (0, {v_ref:.3})")]
    Conversion { voltage: f64, v_ref: f64 },

    #[error("device reports itself unhealthy")]
    Unhealthy,

    #[error("{vessel} heater task lost the device")]
    HeaterFault { vessel: Vessel },
}

/// A command argument outside its legal range. The previous value is kept.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("{what} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Which long-running task a lifecycle error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Heater(Vessel),
    Logger,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Heater(vessel) => write!(f, "{vessel} heater"),
            TaskKind::Logger => f.write_str("sample logger"),
        }
    }
}

/// Errors surfaced at the orchestrator's command boundary.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{task} task did not stop within {waited:?}")]
    TerminationTimeout { task: TaskKind, waited: Duration },

    #[error("interlock: {what}")]
    Interlock { what: &'static str },

    #[error("{vessel} heater is latched in a safety fault until reconnect")]
    VesselFaulted { vessel: Vessel },

    #[error("controller is not connected to a device")]
    NotConnected,

    #[error("duty cycles {mash:.3} + {boil:.3} exceed the shared power limit")]
    Oversubscribed { mash: f64, boil: f64 },

    #[error("{task} task panicked")]
    TaskPanicked { task: TaskKind },

    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: TaskKind,
        #[source]
        source: std::io::Error,
    },

    #[error("sample sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl ControlError {
    /// True for errors that must take the whole controller to its safe state.
    pub fn is_device_fault(&self) -> bool {
        matches!(self, ControlError::Device(_))
    }
}
