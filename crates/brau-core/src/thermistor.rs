//! NTC thermistor voltage to temperature conversion.
//!
//! The sensors sit on the low side of a divider whose series resistor equals
//! the thermistor's nominal resistance, so the DAQ reads
//! `v = v_ref * r / (r + r_nominal)`.

use crate::error::DeviceError;

const KELVIN_OFFSET: f64 = 273.15;
const NOMINAL_TEMP_K: f64 = 25.0 + KELVIN_OFFSET;

pub fn kelvin_to_fahrenheit(k: f64) -> f64 {
    (k - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_kelvin(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0 + KELVIN_OFFSET
}

/// Conversion from a divider voltage to a temperature.
pub trait Thermistor: Send + Sync {
    fn voltage_to_fahrenheit(
        &self,
        resistance_nominal: f64,
        v_ref: f64,
        voltage: f64,
    ) -> Result<f64, DeviceError>;
}

/// Beta-parameter model of an NTC thermistor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaThermistor {
    pub beta: f64,
}

impl BetaThermistor {
    /// EPCOS B57861S 10k, B25/100.
    pub const B57861S: BetaThermistor = BetaThermistor { beta: 3988.0 };

    /// Divider voltage produced at `temp_f`. Used by the simulated device.
    pub fn fahrenheit_to_voltage(&self, resistance_nominal: f64, v_ref: f64, temp_f: f64) -> f64 {
        let t_k = fahrenheit_to_kelvin(temp_f);
        let r = resistance_nominal * (self.beta * (1.0 / t_k - 1.0 / NOMINAL_TEMP_K)).exp();
        v_ref * r / (r + resistance_nominal)
    }
}

impl Default for BetaThermistor {
    fn default() -> Self {
        Self::B57861S
    }
}

impl Thermistor for BetaThermistor {
    fn voltage_to_fahrenheit(
        &self,
        resistance_nominal: f64,
        v_ref: f64,
        voltage: f64,
    ) -> Result<f64, DeviceError> {
        if !voltage.is_finite() || voltage <= 0.0 || voltage >= v_ref {
            return Err(DeviceError::Conversion { voltage, v_ref });
        }
        let r = resistance_nominal * voltage / (v_ref - voltage);
        let inv_t = 1.0 / NOMINAL_TEMP_K + (r / resistance_nominal).ln() / self.beta;
        Ok(kelvin_to_fahrenheit(1.0 / inv_t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_voltage_is_nominal_temperature() {
        let t = BetaThermistor::B57861S
            .voltage_to_fahrenheit(10_000.0, 5.0, 2.5)
            .unwrap();
        assert!((t - 77.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_matches_forward_conversion() {
        let therm = BetaThermistor::B57861S;
        for temp in [68.0, 154.0, 212.0] {
            let v = therm.fahrenheit_to_voltage(10_000.0, 5.0, temp);
            let back = therm.voltage_to_fahrenheit(10_000.0, 5.0, v).unwrap();
            assert!((back - temp).abs() < 1e-6, "{temp} -> {v} -> {back}");
        }
    }

    #[test]
    fn hotter_reads_lower_voltage() {
        let therm = BetaThermistor::B57861S;
        let cold = therm.fahrenheit_to_voltage(10_000.0, 5.0, 70.0);
        let hot = therm.fahrenheit_to_voltage(10_000.0, 5.0, 200.0);
        assert!(hot < cold);
    }

    #[test]
    fn rail_voltages_are_rejected() {
        let therm = BetaThermistor::B57861S;
        assert!(therm.voltage_to_fahrenheit(10_000.0, 5.0, 0.0).is_err());
        assert!(therm.voltage_to_fahrenheit(10_000.0, 5.0, 5.0).is_err());
        assert!(therm
            .voltage_to_fahrenheit(10_000.0, 5.0, f64::NAN)
            .is_err());
    }
}
