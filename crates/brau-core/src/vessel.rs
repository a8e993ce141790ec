use crate::hal::{AnalogChannel, DigitalLine};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two heated vessels sharing the power feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vessel {
    Mash,
    Boil,
}

impl Vessel {
    pub const ALL: [Vessel; 2] = [Vessel::Mash, Vessel::Boil];

    pub fn other(self) -> Vessel {
        match self {
            Vessel::Mash => Vessel::Boil,
            Vessel::Boil => Vessel::Mash,
        }
    }

    pub fn heater_line(self) -> DigitalLine {
        match self {
            Vessel::Mash => DigitalLine::MashHeater,
            Vessel::Boil => DigitalLine::BoilHeater,
        }
    }

    /// Sensor holding the process variable for this vessel.
    pub fn temperature_channel(self) -> AnalogChannel {
        match self {
            Vessel::Mash => AnalogChannel::MashTemp,
            Vessel::Boil => AnalogChannel::BoilTemp,
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Vessel::Mash => 0,
            Vessel::Boil => 1,
        }
    }
}

impl fmt::Display for Vessel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vessel::Mash => f.write_str("mash"),
            Vessel::Boil => f.write_str("boil"),
        }
    }
}

/// Control mode of the boil heater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoilMode {
    /// Duty cycle set directly by the operator.
    #[default]
    Manual,
    /// Duty cycle computed by the PI loop.
    Auto,
}

impl BoilMode {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            BoilMode::Manual => 0,
            BoilMode::Auto => 1,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        if raw == 1 {
            BoilMode::Auto
        } else {
            BoilMode::Manual
        }
    }
}

impl fmt::Display for BoilMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoilMode::Manual => f.write_str("manual"),
            BoilMode::Auto => f.write_str("auto"),
        }
    }
}
