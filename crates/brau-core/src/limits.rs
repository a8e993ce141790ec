use crate::error::ConfigError;
use crate::vessel::Vessel;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy)]
pub struct Unvalidated;

#[derive(Debug, Clone, Copy)]
pub struct Validated;

/// An operator-supplied value that must pass its [`Range`] before use.
#[derive(Debug, Clone, Copy)]
pub struct Setting<State = Unvalidated> {
    value: f64,
    _state: PhantomData<State>,
}

/// Inclusive legal range of one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub what: &'static str,
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(what: &'static str, min: f64, max: f64) -> Self {
        Self { what, min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Setting<Unvalidated> {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            _state: PhantomData,
        }
    }

    pub fn validate(self, range: &Range) -> Result<Setting<Validated>, ConfigError> {
        if !self.value.is_finite() {
            return Err(ConfigError::NonFinite {
                what: range.what,
                value: self.value,
            });
        }
        if !range.contains(self.value) {
            return Err(ConfigError::OutOfRange {
                what: range.what,
                value: self.value,
                min: range.min,
                max: range.max,
            });
        }
        Ok(Setting {
            value: self.value,
            _state: PhantomData,
        })
    }
}

impl Setting<Validated> {
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Legal ranges of every operator input, in °F and percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputLimits {
    pub mash_setpoint: Range,
    pub boil_setpoint: Range,
    pub manual_duty_cycle: Range,
    pub mash_weight_pct: Range,
}

impl InputLimits {
    pub fn setpoint(&self, vessel: Vessel) -> &Range {
        match vessel {
            Vessel::Mash => &self.mash_setpoint,
            Vessel::Boil => &self.boil_setpoint,
        }
    }
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            mash_setpoint: Range::new("mash setpoint", 70.0, 180.0),
            boil_setpoint: Range::new("boil setpoint", 70.0, 212.0),
            manual_duty_cycle: Range::new("manual duty cycle", 0.0, 100.0),
            mash_weight_pct: Range::new("mash weight", 1.0, 99.0),
        }
    }
}

/// Steps `current` by `delta`, saturating at the range ends.
pub fn adjust_bounded(current: f64, delta: f64, min: f64, max: f64) -> f64 {
    (current + delta).clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nan() {
        let res = Setting::new(f64::NAN).validate(&InputLimits::default().mash_setpoint);
        assert!(matches!(res, Err(ConfigError::NonFinite { .. })));
    }

    #[test]
    fn rejects_above_boiling() {
        let res = Setting::new(213.0).validate(&InputLimits::default().boil_setpoint);
        assert!(matches!(
            res,
            Err(ConfigError::OutOfRange { max, .. }) if max == 212.0
        ));
    }

    #[test]
    fn accepts_range_ends() {
        let limits = InputLimits::default();
        assert_eq!(
            Setting::new(70.0).validate(&limits.mash_setpoint).unwrap().value(),
            70.0
        );
        assert_eq!(
            Setting::new(180.0).validate(&limits.mash_setpoint).unwrap().value(),
            180.0
        );
    }

    #[test]
    fn adjust_saturates_both_ways() {
        assert_eq!(adjust_bounded(205.0, 10.0, 70.0, 212.0), 212.0);
        assert_eq!(adjust_bounded(75.0, -10.0, 70.0, 212.0), 70.0);
        assert_eq!(adjust_bounded(50.0, 1.0, 1.0, 99.0), 51.0);
    }
}
