//! Proportional-integral control with integral clamping.
//!
//! The gains were tuned against a `[0, 1]` output; the percentage returned by
//! [`step`] is that value scaled for display and logging only.

use serde::{Deserialize, Serialize};

/// Bound on the accumulated error, in degree-seconds.
pub const INTEGRAL_LIMIT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PiGains {
    pub kp: f64,
    pub ki: f64,
}

impl PiGains {
    pub const fn new(kp: f64, ki: f64) -> Self {
        Self { kp, ki }
    }
}

impl Default for PiGains {
    fn default() -> Self {
        Self::new(0.375, 0.09375)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiOutput {
    /// Controller output in percent, within `[0, 100]`.
    pub duty_cycle_percent: f64,
    /// Integral state to carry into the next step.
    pub integral: f64,
}

impl PiOutput {
    /// Output as a fraction of the control period.
    pub fn fraction(&self) -> f64 {
        self.duty_cycle_percent / 100.0
    }
}

/// One PI step. The caller owns `integral` and decides when to reset it.
pub fn step(
    setpoint: f64,
    process_variable: f64,
    gains: PiGains,
    period_s: f64,
    integral: f64,
) -> PiOutput {
    let error = setpoint - process_variable;
    let integral = (integral + error * period_s).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
    let u = (gains.kp * error + gains.ki * integral).clamp(0.0, 1.0);
    PiOutput {
        duty_cycle_percent: u * 100.0,
        integral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_error_gives_zero_output() {
        let out = step(154.0, 154.0, PiGains::new(0.375, 0.09375), 0.5, 0.0);
        assert_eq!(out.duty_cycle_percent, 0.0);
        assert_eq!(out.integral, 0.0);
    }

    #[test]
    fn integral_accumulates_error_times_period() {
        let out = step(155.0, 154.0, PiGains::new(0.0, 0.0), 0.5, 1.0);
        assert!((out.integral - 1.5).abs() < 1e-12);
    }

    #[test]
    fn large_error_saturates() {
        let out = step(212.0, 60.0, PiGains::default(), 0.5, 0.0);
        assert_eq!(out.duty_cycle_percent, 100.0);
        assert_eq!(out.integral, INTEGRAL_LIMIT);
    }

    #[test]
    fn overshoot_clamps_to_zero_and_winds_down() {
        let out = step(150.0, 170.0, PiGains::default(), 0.5, 5.0);
        assert_eq!(out.duty_cycle_percent, 0.0);
        assert!((out.integral - -5.0).abs() < 1e-12);
    }

    #[test]
    fn proportional_band() {
        // kp * 1 = 0.375 -> 37.5 %
        let out = step(155.0, 154.0, PiGains::new(0.375, 0.0), 0.5, 0.0);
        assert!((out.duty_cycle_percent - 37.5).abs() < 1e-9);
        assert!((out.fraction() - 0.375).abs() < 1e-12);
    }
}
