//! Line-oriented operator console.
//!
//! Each stdin line is one JSON object discriminated by `"type"`, mirroring the
//! buttons and input boxes of the brewing panel.

use brau_core::inputs::InputField;
use brau_core::vessel::{BoilMode, Vessel};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("malformed command: {0}")]
    Json(#[from] serde_json::Error),

    #[error("command has no \"type\" field")]
    MissingType,

    #[error("unknown command type {0:?}")]
    UnknownType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetPumpMsg {
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetEnabledMsg {
    pub vessel: Vessel,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetModeMsg {
    pub mode: BoilMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetSetpointMsg {
    pub vessel: Vessel,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ValueMsg {
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetWeightsMsg {
    /// Fraction in `[0.01, 0.99]`.
    pub mash_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetLoggingMsg {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AdjustMsg {
    pub input: InputField,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Connect,
    Disconnect,
    SetPump(SetPumpMsg),
    SetEnabled(SetEnabledMsg),
    SetMode(SetModeMsg),
    SetSetpoint(SetSetpointMsg),
    SetManualDutyCycle(ValueMsg),
    SetOptimizerWeights(SetWeightsMsg),
    SetLogging(SetLoggingMsg),
    Adjust(AdjustMsg),
    ApplyInputs,
    Status,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let msg_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ConsoleError::MissingType)?
            .to_string();
        let command = match msg_type.as_str() {
            "connect" => ConsoleCommand::Connect,
            "disconnect" => ConsoleCommand::Disconnect,
            "set_pump" => ConsoleCommand::SetPump(serde_json::from_value(value)?),
            "set_enabled" => ConsoleCommand::SetEnabled(serde_json::from_value(value)?),
            "set_mode" => ConsoleCommand::SetMode(serde_json::from_value(value)?),
            "set_setpoint" => ConsoleCommand::SetSetpoint(serde_json::from_value(value)?),
            "set_manual_duty_cycle" => {
                ConsoleCommand::SetManualDutyCycle(serde_json::from_value(value)?)
            }
            "set_optimizer_weights" => {
                ConsoleCommand::SetOptimizerWeights(serde_json::from_value(value)?)
            }
            "set_logging" => ConsoleCommand::SetLogging(serde_json::from_value(value)?),
            "adjust" => ConsoleCommand::Adjust(serde_json::from_value(value)?),
            "apply_inputs" => ConsoleCommand::ApplyInputs,
            "status" => ConsoleCommand::Status,
            "quit" => ConsoleCommand::Quit,
            _ => return Err(ConsoleError::UnknownType(msg_type)),
        };
        Ok(command)
    }

    /// Name used in logs and audit entries.
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Connect => "connect",
            ConsoleCommand::Disconnect => "disconnect",
            ConsoleCommand::SetPump(_) => "set_pump",
            ConsoleCommand::SetEnabled(_) => "set_enabled",
            ConsoleCommand::SetMode(_) => "set_mode",
            ConsoleCommand::SetSetpoint(_) => "set_setpoint",
            ConsoleCommand::SetManualDutyCycle(_) => "set_manual_duty_cycle",
            ConsoleCommand::SetOptimizerWeights(_) => "set_optimizer_weights",
            ConsoleCommand::SetLogging(_) => "set_logging",
            ConsoleCommand::Adjust(_) => "adjust",
            ConsoleCommand::ApplyInputs => "apply_inputs",
            ConsoleCommand::Status => "status",
            ConsoleCommand::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_fields_are_ignored() {
        let cmd = ConsoleCommand::parse(r#"{"type":"set_pump","on":true,"note":"x"}"#).unwrap();
        assert_eq!(cmd, ConsoleCommand::SetPump(SetPumpMsg { on: true }));
    }

    #[test]
    fn missing_argument_is_malformed() {
        assert!(matches!(
            ConsoleCommand::parse(r#"{"type":"set_setpoint","vessel":"mash"}"#),
            Err(ConsoleError::Json(_))
        ));
    }

    #[test]
    fn name_matches_wire_type() {
        let cmd = ConsoleCommand::parse(r#"{"type":"apply_inputs"}"#).unwrap();
        assert_eq!(cmd.name(), "apply_inputs");
    }
}
