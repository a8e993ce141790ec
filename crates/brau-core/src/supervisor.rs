use crate::error::{ControlError, ControlResult};
use crate::vessel::Vessel;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyState {
    #[default]
    Normal,
    /// One heater is latched out; the other may keep running.
    Degraded,
    /// The device failed; everything is OFF until reconnect.
    Trip,
}

/// Latches heater faults until the operator reconnects.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    device_tripped: bool,
    vessel_tripped: [bool; 2],
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SafetyState {
        if self.device_tripped {
            SafetyState::Trip
        } else if self.vessel_tripped.iter().any(|t| *t) {
            SafetyState::Degraded
        } else {
            SafetyState::Normal
        }
    }

    pub fn trip_device(&mut self) {
        self.device_tripped = true;
    }

    pub fn trip_vessel(&mut self, vessel: Vessel) {
        self.vessel_tripped[vessel.slot()] = true;
    }

    pub fn is_tripped(&self, vessel: Vessel) -> bool {
        self.device_tripped || self.vessel_tripped[vessel.slot()]
    }

    /// Refuses to start a heater that is latched out.
    pub fn check_enable(&self, vessel: Vessel) -> ControlResult<()> {
        if self.is_tripped(vessel) {
            return Err(ControlError::VesselFaulted { vessel });
        }
        Ok(())
    }

    /// Clears every latch. Only a fresh connection may call this.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
