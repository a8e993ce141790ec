//! Operator inputs staged on the panel before being committed together.

use crate::limits::{adjust_bounded, InputLimits, Range};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    MashSetpoint,
    BoilSetpoint,
    ManualDutyCycle,
    MashWeight,
}

impl InputField {
    pub const ALL: [InputField; 4] = [
        InputField::MashSetpoint,
        InputField::BoilSetpoint,
        InputField::ManualDutyCycle,
        InputField::MashWeight,
    ];

    pub fn range(self, limits: &InputLimits) -> &Range {
        match self {
            InputField::MashSetpoint => &limits.mash_setpoint,
            InputField::BoilSetpoint => &limits.boil_setpoint,
            InputField::ManualDutyCycle => &limits.manual_duty_cycle,
            InputField::MashWeight => &limits.mash_weight_pct,
        }
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputField::MashSetpoint => "mash setpoint",
            InputField::BoilSetpoint => "boil setpoint",
            InputField::ManualDutyCycle => "manual duty cycle",
            InputField::MashWeight => "mash weight",
        };
        f.write_str(name)
    }
}

/// Values shown in the panel's input boxes, in °F and percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StagedInputs {
    pub mash_setpoint: f64,
    pub boil_setpoint: f64,
    pub manual_duty_cycle: f64,
    pub mash_weight_pct: f64,
}

impl StagedInputs {
    pub fn get(&self, field: InputField) -> f64 {
        match field {
            InputField::MashSetpoint => self.mash_setpoint,
            InputField::BoilSetpoint => self.boil_setpoint,
            InputField::ManualDutyCycle => self.manual_duty_cycle,
            InputField::MashWeight => self.mash_weight_pct,
        }
    }

    fn slot(&mut self, field: InputField) -> &mut f64 {
        match field {
            InputField::MashSetpoint => &mut self.mash_setpoint,
            InputField::BoilSetpoint => &mut self.boil_setpoint,
            InputField::ManualDutyCycle => &mut self.manual_duty_cycle,
            InputField::MashWeight => &mut self.mash_weight_pct,
        }
    }

    /// Steps one field by `delta`, saturating at its range. Returns the new value.
    pub fn adjust(&mut self, field: InputField, delta: f64, limits: &InputLimits) -> f64 {
        let range = field.range(limits);
        let value = self.slot(field);
        if delta.is_finite() {
            *value = adjust_bounded(*value, delta, range.min, range.max);
        }
        *value
    }
}

impl Default for StagedInputs {
    fn default() -> Self {
        Self {
            mash_setpoint: 154.0,
            boil_setpoint: 170.0,
            manual_duty_cycle: 0.0,
            mash_weight_pct: 50.0,
        }
    }
}
