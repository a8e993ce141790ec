//! State shared between the orchestrator, the heater tasks, the sampler and
//! every reader (console, logger, metrics).
//!
//! Each field is a lone atomic with exactly one writer:
//!
//! | field group | writer |
//! |---|---|
//! | connected, pump, enabled, setpoints, boil mode, manual duty, weights, logging | orchestrator |
//! | process variables, heater temperature | sampler |
//! | integral, raw/resolved duty, redistribution flag, line state | that vessel's heater task |
//!
//! The device fault flag is a latch: any task may raise it, only the
//! orchestrator clears it. Readers take field-by-field snapshots, so a
//! snapshot may mix values from adjacent periods.
//!
//! The power allocation is the one locked field. Whichever heater task
//! reaches a period boundary first resolves both demands for that period and
//! the other task reuses the result, so the two heaters always play back the
//! same schedule.

use crate::optimizer::{OptimizerWeights, Resolution};
use crate::pi::PiGains;
use crate::timebase::TimeBase;
use crate::vessel::{BoilMode, Vessel};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

/// `f64` stored as its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Per-vessel slice of the shared block.
#[derive(Debug, Default)]
pub struct VesselState {
    enabled: AtomicBool,
    setpoint: AtomicF64,
    process_variable: AtomicF64,
    error_integral: AtomicF64,
    duty_cycle_raw: AtomicF64,
    duty_cycle_resolved: AtomicF64,
    redistributed: AtomicBool,
    heater_on: AtomicBool,
}

impl VesselState {
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint.load()
    }

    pub fn process_variable(&self) -> f64 {
        self.process_variable.load()
    }

    pub fn error_integral(&self) -> f64 {
        self.error_integral.load()
    }

    /// Demanded duty cycle in percent, before the optimizer.
    pub fn duty_cycle_raw(&self) -> f64 {
        self.duty_cycle_raw.load()
    }

    /// Duty cycle in percent actually handed to the output scheduler.
    pub fn duty_cycle_resolved(&self) -> f64 {
        self.duty_cycle_resolved.load()
    }

    pub fn redistributed(&self) -> bool {
        self.redistributed.load(Ordering::Acquire)
    }

    /// Last level written to this vessel's heater line.
    pub fn heater_on(&self) -> bool {
        self.heater_on.load(Ordering::Acquire)
    }

    // Orchestrator-owned.
    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub(crate) fn set_setpoint(&self, value: f64) {
        self.setpoint.store(value);
    }

    // Sampler-owned.
    pub(crate) fn set_process_variable(&self, value: f64) {
        self.process_variable.store(value);
    }

    // Heater-task-owned.
    pub(crate) fn publish_integral(&self, value: f64) {
        self.error_integral.store(value);
    }

    pub(crate) fn publish_demand(&self, raw_percent: f64) {
        self.duty_cycle_raw.store(raw_percent);
    }

    pub(crate) fn publish_resolved(&self, percent: f64, redistributed: bool) {
        self.duty_cycle_resolved.store(percent);
        self.redistributed.store(redistributed, Ordering::Release);
    }

    pub(crate) fn publish_heater(&self, on: bool) {
        self.heater_on.store(on, Ordering::Release);
    }

    /// Clears everything the heater task owns. Called by the task as it exits.
    pub(crate) fn publish_stopped(&self) {
        self.publish_integral(0.0);
        self.publish_demand(0.0);
        self.publish_resolved(0.0, false);
        self.publish_heater(false);
    }
}

#[derive(Debug, Clone, Copy)]
struct Allocation {
    period_index: u64,
    resolution: Resolution,
}

/// The single block of state visible to all tasks.
#[derive(Debug)]
pub struct SharedControlState {
    timebase: TimeBase,
    connected: AtomicBool,
    pump_on: AtomicBool,
    logging: AtomicBool,
    boil_mode: AtomicU8,
    boil_mode_generation: AtomicU64,
    manual_duty_cycle: AtomicF64,
    weight_mash: AtomicF64,
    heater_temp: AtomicF64,
    device_fault: AtomicU8,
    vessels: [VesselState; 2],
    gains: [PiGains; 2],
    allocation: Mutex<Option<Allocation>>,
}

impl SharedControlState {
    pub(crate) fn new(timebase: TimeBase, mash_gains: PiGains, boil_gains: PiGains) -> Self {
        Self {
            timebase,
            connected: AtomicBool::new(false),
            pump_on: AtomicBool::new(false),
            logging: AtomicBool::new(false),
            boil_mode: AtomicU8::new(BoilMode::Manual.as_u8()),
            boil_mode_generation: AtomicU64::new(0),
            manual_duty_cycle: AtomicF64::new(0.0),
            weight_mash: AtomicF64::new(OptimizerWeights::EQUAL.mash()),
            heater_temp: AtomicF64::new(0.0),
            device_fault: AtomicU8::new(0),
            vessels: Default::default(),
            gains: [mash_gains, boil_gains],
            allocation: Mutex::new(None),
        }
    }

    pub fn timebase(&self) -> &TimeBase {
        &self.timebase
    }

    pub fn vessel(&self, vessel: Vessel) -> &VesselState {
        &self.vessels[vessel.slot()]
    }

    pub fn gains(&self, vessel: Vessel) -> PiGains {
        self.gains[vessel.slot()]
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn pump_on(&self) -> bool {
        self.pump_on.load(Ordering::Acquire)
    }

    pub fn logging(&self) -> bool {
        self.logging.load(Ordering::Acquire)
    }

    pub fn boil_mode(&self) -> BoilMode {
        BoilMode::from_u8(self.boil_mode.load(Ordering::Acquire))
    }

    /// Number of boil mode changes so far. A task that sees it move knows a
    /// switch happened even if the mode has since switched back.
    pub fn boil_mode_generation(&self) -> u64 {
        self.boil_mode_generation.load(Ordering::Acquire)
    }

    /// Operator-set boil duty cycle in percent, used in manual mode.
    pub fn manual_duty_cycle(&self) -> f64 {
        self.manual_duty_cycle.load()
    }

    pub fn weights(&self) -> OptimizerWeights {
        // Only validated weights are ever stored.
        OptimizerWeights::new(self.weight_mash.load()).unwrap_or_default()
    }

    pub fn heater_temp(&self) -> f64 {
        self.heater_temp.load()
    }

    /// Heater task that latched a device fault, if any.
    pub fn device_fault(&self) -> Option<Vessel> {
        match self.device_fault.load(Ordering::Acquire) {
            0 => None,
            1 => Some(Vessel::Mash),
            _ => Some(Vessel::Boil),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub(crate) fn set_pump(&self, on: bool) {
        self.pump_on.store(on, Ordering::Release);
    }

    pub(crate) fn set_logging(&self, on: bool) {
        self.logging.store(on, Ordering::Release);
    }

    pub(crate) fn set_boil_mode(&self, mode: BoilMode) {
        let previous = self.boil_mode.swap(mode.as_u8(), Ordering::AcqRel);
        if previous != mode.as_u8() {
            self.boil_mode_generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub(crate) fn set_manual_duty_cycle(&self, percent: f64) {
        self.manual_duty_cycle.store(percent);
    }

    pub(crate) fn set_weights(&self, weights: OptimizerWeights) {
        self.weight_mash.store(weights.mash());
    }

    pub(crate) fn set_heater_temp(&self, value: f64) {
        self.heater_temp.store(value);
    }

    /// Latches a fault. The first reporter wins.
    pub(crate) fn raise_device_fault(&self, reporter: Vessel) {
        let code = reporter.slot() as u8 + 1;
        let _ = self
            .device_fault
            .compare_exchange(0, code, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn clear_device_fault(&self) {
        self.device_fault.store(0, Ordering::Release);
    }

    /// Power split for period `period_index`, computed by `resolve` if no
    /// heater has claimed that period yet.
    pub(crate) fn allocate(&self, period_index: u64, resolve: impl FnOnce() -> Resolution) -> Resolution {
        let mut slot = self
            .allocation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match *slot {
            Some(current) if current.period_index == period_index => current.resolution,
            _ => {
                let resolution = resolve();
                *slot = Some(Allocation {
                    period_index,
                    resolution,
                });
                resolution
            }
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let mash = self.loop_state(Vessel::Mash);
        let boil = self.loop_state(Vessel::Boil);
        ControlSnapshot {
            timestamp_us: self.timebase.now_us(),
            connected: self.connected(),
            pump_on: self.pump_on(),
            logging: self.logging(),
            boil_mode: self.boil_mode(),
            manual_duty_cycle: self.manual_duty_cycle(),
            weight_mash: self.weights().mash(),
            weight_boil: self.weights().boil(),
            heater_temp: self.heater_temp(),
            optimizer_active: self.vessel(Vessel::Mash).redistributed()
                || self.vessel(Vessel::Boil).redistributed(),
            device_fault: self.device_fault().is_some(),
            mash,
            boil,
        }
    }

    fn loop_state(&self, vessel: Vessel) -> ControlLoopState {
        let v = self.vessel(vessel);
        let gains = self.gains(vessel);
        ControlLoopState {
            setpoint: v.setpoint(),
            process_variable: v.process_variable(),
            error_integral: v.error_integral(),
            gain_p: gains.kp,
            gain_i: gains.ki,
            duty_cycle_raw: v.duty_cycle_raw(),
            duty_cycle_resolved: v.duty_cycle_resolved(),
            enabled: v.enabled(),
            heater_on: v.heater_on(),
        }
    }
}

/// One vessel's loop as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ControlLoopState {
    pub setpoint: f64,
    pub process_variable: f64,
    pub error_integral: f64,
    pub gain_p: f64,
    pub gain_i: f64,
    pub duty_cycle_raw: f64,
    pub duty_cycle_resolved: f64,
    pub enabled: bool,
    pub heater_on: bool,
}

/// Best-effort copy of the shared block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub timestamp_us: u64,
    pub connected: bool,
    pub pump_on: bool,
    pub logging: bool,
    pub boil_mode: BoilMode,
    pub manual_duty_cycle: f64,
    pub weight_mash: f64,
    pub weight_boil: f64,
    pub heater_temp: f64,
    pub optimizer_active: bool,
    pub device_fault: bool,
    pub mash: ControlLoopState,
    pub boil: ControlLoopState,
}

impl ControlSnapshot {
    pub fn vessel(&self, vessel: Vessel) -> &ControlLoopState {
        match vessel {
            Vessel::Mash => &self.mash,
            Vessel::Boil => &self.boil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SharedControlState {
        SharedControlState::new(TimeBase::new(), PiGains::default(), PiGains::default())
    }

    #[test]
    fn atomic_f64_round_trips_bits() {
        let a = AtomicF64::new(-0.0);
        assert!(a.load().is_sign_negative());
        a.store(154.25);
        assert_eq!(a.load(), 154.25);
    }

    #[test]
    fn snapshot_reflects_writers() {
        let s = state();
        s.vessel(Vessel::Mash).set_setpoint(154.0);
        s.vessel(Vessel::Mash).set_process_variable(150.0);
        s.vessel(Vessel::Boil).publish_resolved(50.0, true);
        s.set_boil_mode(BoilMode::Auto);
        let snap = s.snapshot();
        assert_eq!(snap.mash.setpoint, 154.0);
        assert_eq!(snap.mash.process_variable, 150.0);
        assert_eq!(snap.boil.duty_cycle_resolved, 50.0);
        assert!(snap.optimizer_active);
        assert_eq!(snap.boil_mode, BoilMode::Auto);
        assert_eq!(snap.mash.gain_p, 0.375);
    }

    #[test]
    fn mode_generation_counts_real_changes() {
        let s = state();
        let start = s.boil_mode_generation();
        s.set_boil_mode(BoilMode::Manual);
        assert_eq!(s.boil_mode_generation(), start);
        s.set_boil_mode(BoilMode::Auto);
        s.set_boil_mode(BoilMode::Manual);
        assert_eq!(s.boil_mode_generation(), start + 2);
        assert_eq!(s.boil_mode(), BoilMode::Manual);
    }

    #[test]
    fn stopped_task_clears_its_fields() {
        let s = state();
        let mash = s.vessel(Vessel::Mash);
        mash.publish_integral(3.0);
        mash.publish_demand(80.0);
        mash.publish_resolved(60.0, true);
        mash.publish_heater(true);
        mash.publish_stopped();
        let snap = s.snapshot();
        assert_eq!(snap.mash.error_integral, 0.0);
        assert_eq!(snap.mash.duty_cycle_raw, 0.0);
        assert!(!snap.mash.heater_on);
        assert!(!snap.optimizer_active);
    }

    #[test]
    fn first_fault_reporter_wins() {
        let s = state();
        assert_eq!(s.device_fault(), None);
        s.raise_device_fault(Vessel::Boil);
        s.raise_device_fault(Vessel::Mash);
        assert_eq!(s.device_fault(), Some(Vessel::Boil));
        s.clear_device_fault();
        assert!(!s.snapshot().device_fault);
    }

    #[test]
    fn allocation_is_shared_within_a_period() {
        let s = state();
        let first = s.allocate(7, || crate::optimizer::resolve(0.6, 0.6, OptimizerWeights::EQUAL));
        let second = s.allocate(7, || crate::optimizer::resolve(0.2, 0.2, OptimizerWeights::EQUAL));
        assert_eq!(first, second);
        let next = s.allocate(8, || crate::optimizer::resolve(0.2, 0.2, OptimizerWeights::EQUAL));
        assert!(!next.active);
    }

    #[test]
    fn weights_always_sum_to_one() {
        let s = state();
        s.set_weights(OptimizerWeights::new(0.3).unwrap());
        let snap = s.snapshot();
        assert!((snap.weight_mash + snap.weight_boil - 1.0).abs() < 1e-15);
    }
}
