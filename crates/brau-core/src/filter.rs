//! First-order low-pass filtering of temperature readings.

use std::f64::consts::PI;
use std::time::Duration;

/// Cutoff used for every temperature channel.
pub const DEFAULT_CUTOFF_HZ: f64 = 3.0;

/// Smoothing coefficient for an update rate of `1 / period` and the given cutoff.
pub fn smoothing_coefficient(period: Duration, cutoff_hz: f64) -> f64 {
    let update_hz = 1.0 / period.as_secs_f64();
    let wc = 2.0 * PI * update_hz * cutoff_hz;
    wc / (wc + 1.0)
}

/// One exponential moving average step.
pub fn ema(raw: f64, previous: f64, alpha: f64) -> f64 {
    alpha * raw + (1.0 - alpha) * previous
}

/// Filter state for a single sensor.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureFilter {
    alpha: f64,
    value: Option<f64>,
}

impl TemperatureFilter {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn for_period(period: Duration, cutoff_hz: f64) -> Self {
        Self::new(smoothing_coefficient(period, cutoff_hz))
    }

    /// Feeds one raw reading. The first reading after a reset seeds the filter.
    pub fn update(&mut self, raw: f64) -> f64 {
        let next = match self.value {
            Some(previous) => ema(raw, previous, self.alpha),
            None => raw,
        };
        self.value = Some(next);
        next
    }

    /// Forget history so the next reading seeds the filter again.
    pub fn reset(&mut self) {
        self.value = None;
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
