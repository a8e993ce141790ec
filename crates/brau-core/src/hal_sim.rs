use crate::error::DeviceError;
use crate::hal::{AnalogChannel, BrewDevice, DataFormat, DigitalLine, TemperatureUnit};
use crate::thermistor::BetaThermistor;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const HISTORY_LIMIT: usize = 4096;
const BOILING_F: f64 = 212.0;

/// One write to a digital line, as seen by the simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputEvent {
    pub at: Instant,
    pub line: DigitalLine,
    pub on: bool,
}

/// Switch for making a [`SimulatedBrewery`] fail on demand.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    pub fn trip(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Simulated RIMS brewery with thermal dynamics, in °F.
///
/// Wort circulates from the mash tun through the heater chamber while the
/// pump runs. The boil kettle is heated directly and caps at boiling. All
/// bodies lose heat to ambient. State advances with wall time on every call.
#[derive(Debug, Clone)]
pub struct SimulatedBrewery {
    connected: bool,
    output_mode: Option<(DataFormat, TemperatureUnit)>,
    outputs: [bool; 3],

    mash_f: f64,
    heater_f: f64,
    boil_f: f64,
    ambient_f: f64,

    heater_rate: f64,
    boil_rate: f64,
    flow_coeff: f64,
    mash_coupling: f64,
    loss_coeff: f64,

    thermistor: BetaThermistor,
    resistance_nominal: f64,
    v_ref: f64,

    last_step: Instant,
    faults: FaultSwitch,
    history: VecDeque<OutputEvent>,
}

impl SimulatedBrewery {
    pub fn new() -> Self {
        Self {
            connected: false,
            output_mode: None,
            outputs: [false; 3],
            mash_f: 68.0,
            heater_f: 68.0,
            boil_f: 68.0,
            ambient_f: 68.0,
            heater_rate: 4.0,
            boil_rate: 0.1,
            flow_coeff: 0.5,
            mash_coupling: 0.05,
            loss_coeff: 0.0005,
            thermistor: BetaThermistor::B57861S,
            resistance_nominal: 10_000.0,
            v_ref: 5.0,
            last_step: Instant::now(),
            faults: FaultSwitch::default(),
            history: VecDeque::new(),
        }
    }

    /// Starts the vessels at the given temperatures instead of ambient.
    pub fn with_temperatures(mut self, mash_f: f64, heater_f: f64, boil_f: f64) -> Self {
        self.mash_f = mash_f;
        self.heater_f = heater_f;
        self.boil_f = boil_f;
        self
    }

    /// Matches the divider the controller converts with.
    pub fn with_divider(mut self, resistance_nominal: f64, v_ref: f64) -> Self {
        self.resistance_nominal = resistance_nominal;
        self.v_ref = v_ref;
        self
    }

    /// Handle that makes every subsequent driver call fail while tripped.
    pub fn fault_switch(&self) -> FaultSwitch {
        self.faults.clone()
    }

    pub fn digital(&self, line: DigitalLine) -> bool {
        self.outputs[Self::slot(line)]
    }

    pub fn output_mode(&self) -> Option<(DataFormat, TemperatureUnit)> {
        self.output_mode
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Most recent output writes, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &OutputEvent> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn temperature(&self, channel: AnalogChannel) -> f64 {
        match channel {
            AnalogChannel::MashTemp => self.mash_f,
            AnalogChannel::HeaterTemp => self.heater_f,
            AnalogChannel::BoilTemp => self.boil_f,
        }
    }

    fn slot(line: DigitalLine) -> usize {
        match line {
            DigitalLine::Pump => 0,
            DigitalLine::MashHeater => 1,
            DigitalLine::BoilHeater => 2,
        }
    }

    fn check(&self) -> Result<(), DeviceError> {
        if self.faults.is_tripped() {
            return Err(DeviceError::ConnectFailed {
                reason: "simulated link failure".into(),
            });
        }
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        Ok(())
    }

    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_step).min(Duration::from_secs(5));
        self.last_step = now;
        self.step(dt.as_secs_f64());
    }

    /// Advances the thermal model by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        let pump = self.outputs[0];
        let mash_heater = self.outputs[1];
        let boil_heater = self.outputs[2];

        if mash_heater {
            self.heater_f += self.heater_rate * dt_s;
        }
        if pump {
            let exchange = (self.mash_f - self.heater_f) * self.flow_coeff * dt_s;
            self.heater_f += exchange;
            self.mash_f -= exchange * self.mash_coupling;
        }
        if boil_heater {
            self.boil_f = (self.boil_f + self.boil_rate * dt_s).min(BOILING_F);
        }

        self.mash_f += (self.ambient_f - self.mash_f) * self.loss_coeff * dt_s;
        self.heater_f += (self.ambient_f - self.heater_f) * self.loss_coeff * dt_s;
        self.boil_f += (self.ambient_f - self.boil_f) * self.loss_coeff * dt_s;
    }
}

impl Default for SimulatedBrewery {
    fn default() -> Self {
        Self::new()
    }
}

impl BrewDevice for SimulatedBrewery {
    fn connect(&mut self) -> Result<(), DeviceError> {
        if self.faults.is_tripped() {
            return Err(DeviceError::ConnectFailed {
                reason: "simulated device unreachable".into(),
            });
        }
        self.connected = true;
        self.last_step = Instant::now();
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.advance();
        self.connected = false;
        self.output_mode = None;
        Ok(())
    }

    fn set_output_mode(
        &mut self,
        format: DataFormat,
        unit: TemperatureUnit,
    ) -> Result<(), DeviceError> {
        self.check()?;
        self.output_mode = Some((format, unit));
        Ok(())
    }

    fn read_analog(&mut self, channel: AnalogChannel) -> Result<f64, DeviceError> {
        self.check()?;
        self.advance();
        Ok(self.thermistor.fahrenheit_to_voltage(
            self.resistance_nominal,
            self.v_ref,
            self.temperature(channel),
        ))
    }

    fn write_digital(&mut self, line: DigitalLine, on: bool) -> Result<(), DeviceError> {
        self.check()?;
        self.advance();
        self.outputs[Self::slot(line)] = on;
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(OutputEvent {
            at: self.last_step,
            line,
            on,
        });
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.faults.is_tripped()
            && self.mash_f.is_finite()
            && self.heater_f.is_finite()
            && self.boil_f.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermistor::Thermistor;

    #[test]
    fn io_requires_connection() {
        let mut sim = SimulatedBrewery::new();
        assert_eq!(
            sim.read_analog(AnalogChannel::MashTemp),
            Err(DeviceError::NotConnected)
        );
        sim.connect().unwrap();
        assert!(sim.write_digital(DigitalLine::Pump, true).is_ok());
        assert!(sim.digital(DigitalLine::Pump));
    }

    #[test]
    fn analog_reads_convert_back_to_temperature() {
        let mut sim = SimulatedBrewery::new().with_temperatures(152.0, 160.0, 190.0);
        sim.connect().unwrap();
        let v = sim.read_analog(AnalogChannel::BoilTemp).unwrap();
        let t = BetaThermistor::B57861S
            .voltage_to_fahrenheit(10_000.0, 5.0, v)
            .unwrap();
        assert!((t - 190.0).abs() < 0.1);
    }

    #[test]
    fn heaters_raise_temperature() {
        let mut sim = SimulatedBrewery::new().with_temperatures(150.0, 150.0, 150.0);
        sim.outputs = [true, true, true];
        for _ in 0..20 {
            sim.step(0.5);
        }
        assert!(sim.heater_f > 150.0);
        assert!(sim.mash_f > 150.0);
        assert!(sim.boil_f > 150.0);
    }

    #[test]
    fn boil_kettle_caps_at_boiling() {
        let mut sim = SimulatedBrewery::new().with_temperatures(68.0, 68.0, 211.9);
        sim.outputs[2] = true;
        sim.step(60.0);
        assert!(sim.boil_f <= BOILING_F);
    }

    #[test]
    fn tripped_fault_switch_fails_io() {
        let mut sim = SimulatedBrewery::new();
        sim.connect().unwrap();
        let faults = sim.fault_switch();
        faults.trip();
        assert!(sim.write_digital(DigitalLine::MashHeater, true).is_err());
        assert!(!sim.is_healthy());
        faults.clear();
        assert!(sim.is_healthy());
    }

    #[test]
    fn history_records_writes_in_order() {
        let mut sim = SimulatedBrewery::new();
        sim.connect().unwrap();
        sim.write_digital(DigitalLine::BoilHeater, true).unwrap();
        sim.write_digital(DigitalLine::BoilHeater, false).unwrap();
        let levels: Vec<bool> = sim.history().map(|e| e.on).collect();
        assert_eq!(levels, vec![true, false]);
    }
}
