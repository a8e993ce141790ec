use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Analog input pins of the DAQ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalogChannel {
    MashTemp,
    HeaterTemp,
    BoilTemp,
}

impl AnalogChannel {
    pub const ALL: [AnalogChannel; 3] = [
        AnalogChannel::MashTemp,
        AnalogChannel::HeaterTemp,
        AnalogChannel::BoilTemp,
    ];

    /// Pin number on the DAQ header.
    pub fn index(self) -> u8 {
        match self {
            AnalogChannel::MashTemp => 1,
            AnalogChannel::HeaterTemp => 2,
            AnalogChannel::BoilTemp => 3,
        }
    }
}

/// Digital output pins of the DAQ. Each drives one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigitalLine {
    Pump,
    MashHeater,
    BoilHeater,
}

impl DigitalLine {
    pub const ALL: [DigitalLine; 3] = [
        DigitalLine::Pump,
        DigitalLine::MashHeater,
        DigitalLine::BoilHeater,
    ];

    /// Pin number on the DAQ header.
    pub fn index(self) -> u8 {
        match self {
            DigitalLine::Pump => 4,
            DigitalLine::MashHeater => 5,
            DigitalLine::BoilHeater => 6,
        }
    }

    /// The other relay on the shared heater feed.
    pub fn heater_partner(self) -> Option<DigitalLine> {
        match self {
            DigitalLine::Pump => None,
            DigitalLine::MashHeater => Some(DigitalLine::BoilHeater),
            DigitalLine::BoilHeater => Some(DigitalLine::MashHeater),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// The DAQ as seen by the control engine.
pub trait BrewDevice: Send {
    fn connect(&mut self) -> Result<(), DeviceError>;
    fn disconnect(&mut self) -> Result<(), DeviceError>;
    fn set_output_mode(
        &mut self,
        format: DataFormat,
        unit: TemperatureUnit,
    ) -> Result<(), DeviceError>;
    fn read_analog(&mut self, channel: AnalogChannel) -> Result<f64, DeviceError>;
    fn write_digital(&mut self, line: DigitalLine, on: bool) -> Result<(), DeviceError>;
    fn is_healthy(&self) -> bool;
}

/// Shared access to one device from several tasks.
///
/// The lock is held for a single write sequence, never across a sleep.
pub struct DeviceHandle<D: BrewDevice> {
    inner: Arc<Mutex<D>>,
}

impl<D: BrewDevice> Clone for DeviceHandle<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: BrewDevice> DeviceHandle<D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Locks the driver. A poisoned lock still yields the driver: a panicked
    /// task must not prevent outputs from being zeroed.
    pub fn lock(&self) -> MutexGuard<'_, D> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn read_analog(&self, channel: AnalogChannel) -> Result<f64, DeviceError> {
        self.lock().read_analog(channel)
    }

    /// Writes one output. Turning a heater ON first writes its partner OFF
    /// under the same lock, so the two heater relays are never closed
    /// together whatever order the tasks arrive in.
    pub fn write_digital(&self, line: DigitalLine, on: bool) -> Result<(), DeviceError> {
        let mut device = self.lock();
        if on {
            if let Some(partner) = line.heater_partner() {
                device.write_digital(partner, false)?;
            }
        }
        device.write_digital(line, on)
    }

    /// Drives every output OFF, attempting each line even if an earlier one
    /// fails. Returns the first error seen.
    pub fn force_all_off(&self) -> Result<(), DeviceError> {
        let mut device = self.lock();
        let mut first_err = None;
        for line in DigitalLine::ALL {
            if let Err(e) = device.write_digital(line, false) {
                log::error!("failed to force line {} OFF: {}", line.index(), e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(all(test, feature = "simulation"))]
mod tests {
    use super::*;
    use crate::hal_sim::SimulatedBrewery;

    #[test]
    fn heater_on_breaks_partner_first() {
        let mut sim = SimulatedBrewery::new();
        sim.connect().unwrap();
        let device = DeviceHandle::new(sim);
        device.write_digital(DigitalLine::BoilHeater, true).unwrap();
        device.write_digital(DigitalLine::MashHeater, true).unwrap();

        let sim = device.lock();
        assert!(sim.digital(DigitalLine::MashHeater));
        assert!(!sim.digital(DigitalLine::BoilHeater));
        let writes: Vec<(DigitalLine, bool)> = sim.history().map(|e| (e.line, e.on)).collect();
        assert_eq!(
            &writes[writes.len() - 2..],
            &[(DigitalLine::BoilHeater, false), (DigitalLine::MashHeater, true)]
        );
    }

    #[test]
    fn pump_write_leaves_heaters_alone() {
        let mut sim = SimulatedBrewery::new();
        sim.connect().unwrap();
        let device = DeviceHandle::new(sim);
        device.write_digital(DigitalLine::MashHeater, true).unwrap();
        device.write_digital(DigitalLine::Pump, true).unwrap();
        assert!(device.lock().digital(DigitalLine::MashHeater));
        assert!(device.lock().digital(DigitalLine::Pump));
    }
}
