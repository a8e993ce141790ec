use crate::filter::DEFAULT_CUTOFF_HZ;
use crate::hal::{BrewDevice, DeviceHandle};
use crate::inputs::StagedInputs;
use crate::limits::InputLimits;
use crate::optimizer::{self, Resolution};
use crate::pi::{self, PiGains};
use crate::scheduler::{run_line, LineRun, SchedulePlan};
use crate::state::SharedControlState;
use crate::timebase::Ticker;
use crate::vessel::{BoilMode, Vessel};
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ControlConfig {
    pub period: Duration,
    pub filter_cutoff_hz: f64,
    pub mash_gains: PiGains,
    pub boil_gains: PiGains,
    pub limits: InputLimits,
    pub initial_inputs: StagedInputs,
    pub log_interval: Duration,
    /// Extra time a stopping task gets beyond one period.
    pub termination_grace: Duration,
    pub thermistor_nominal_ohms: f64,
    pub thermistor_v_ref: f64,
    pub thermistor_beta: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(500),
            filter_cutoff_hz: DEFAULT_CUTOFF_HZ,
            mash_gains: PiGains::default(),
            boil_gains: PiGains::default(),
            limits: InputLimits::default(),
            initial_inputs: StagedInputs::default(),
            log_interval: Duration::from_secs(1),
            termination_grace: Duration::from_millis(100),
            thermistor_nominal_ohms: 10_000.0,
            thermistor_v_ref: 5.0,
            thermistor_beta: 3988.0,
        }
    }
}

impl ControlConfig {
    /// Raises the log interval to the control period if it is shorter.
    pub fn normalized(mut self) -> Self {
        if self.log_interval < self.period {
            log::warn!(
                "log interval {:?} is shorter than the control period {:?}; using the period",
                self.log_interval,
                self.period
            );
            self.log_interval = self.period;
        }
        self
    }

    /// How long a stop may take before the task counts as hung.
    pub fn termination_timeout(&self) -> Duration {
        self.period + self.termination_grace
    }

    pub fn gains(&self, vessel: Vessel) -> PiGains {
        match vessel {
            Vessel::Mash => self.mash_gains,
            Vessel::Boil => self.boil_gains,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct ExecutionStats {
    pub periods_executed: u64,
    pub periods_overrun: u64,
    pub max_jitter_us: u64,
    pub redistributed_periods: u64,
}

/// Periodic heater task for one vessel.
///
/// Every period it computes the vessel's demand, takes the period's power
/// allocation (resolving it against the other vessel's latest demand if it
/// is first), and plays back its own line of the resulting schedule. Only
/// this task writes its line while it runs; the device handle keeps the
/// partner line OFF whenever it turns its own ON.
pub struct HeaterLoop<D: BrewDevice> {
    vessel: Vessel,
    device: DeviceHandle<D>,
    state: Arc<SharedControlState>,
    period: Duration,
    stats: ExecutionStats,
    integral: f64,
    mode_generation: u64,
}

impl<D: BrewDevice> HeaterLoop<D> {
    pub fn new(
        vessel: Vessel,
        device: DeviceHandle<D>,
        state: Arc<SharedControlState>,
        period: Duration,
    ) -> Self {
        let mode_generation = state.boil_mode_generation();
        Self {
            vessel,
            device,
            state,
            period,
            stats: ExecutionStats::default(),
            integral: 0.0,
            mode_generation,
        }
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        let line = self.vessel.heater_line();
        let mut ticker = Ticker::aligned(self.state.timebase(), self.period);
        self.state.vessel(self.vessel).publish_integral(0.0);

        while let Some(period_start) = ticker.wait(stop) {
            let jitter_us = period_start.elapsed().as_micros() as u64;
            let index = self.state.timebase().period_index(self.period, period_start);
            let resolution = self.step(index);

            let plan = match SchedulePlan::build(resolution.mash, resolution.boil, self.period) {
                Ok(plan) => plan,
                Err(e) => {
                    log::error!("{} heater: {}; holding OFF this period", self.vessel, e);
                    SchedulePlan::idle(self.period)
                }
            };

            let vessel_state = self.state.vessel(self.vessel);
            let outcome = run_line(&plan, line, period_start, &self.device, stop, |on| {
                vessel_state.publish_heater(on)
            });
            match outcome {
                Ok(LineRun::Completed) => {}
                Ok(LineRun::Stopped) => break,
                Err(e) => {
                    log::error!("{} heater lost the device: {}", self.vessel, e);
                    self.state.raise_device_fault(self.vessel);
                    break;
                }
            }

            self.stats.periods_executed += 1;
            self.stats.periods_overrun = ticker.overruns();
            self.stats.max_jitter_us = self.stats.max_jitter_us.max(jitter_us);
            if resolution.active {
                self.stats.redistributed_periods += 1;
            }
        }
        self.stats.periods_overrun = ticker.overruns();
        self.emergency_stop();
    }

    /// Computes the demand for period `period_index`, takes that period's
    /// allocation and publishes both.
    pub fn step(&mut self, period_index: u64) -> Resolution {
        let own = self.demand();
        let vessel_state = self.state.vessel(self.vessel);
        vessel_state.publish_demand(own * 100.0);

        let state = &self.state;
        let vessel = self.vessel;
        let resolution = state.allocate(period_index, || {
            let other = state.vessel(vessel.other());
            let other_demand = if other.enabled() {
                other.duty_cycle_raw() / 100.0
            } else {
                0.0
            };
            let (mash, boil) = match vessel {
                Vessel::Mash => (own, other_demand),
                Vessel::Boil => (other_demand, own),
            };
            optimizer::resolve(mash, boil, state.weights())
        });
        vessel_state.publish_resolved(resolution.get(self.vessel) * 100.0, resolution.active);
        resolution
    }

    /// Raw demand of this vessel as a fraction of the period.
    fn demand(&mut self) -> f64 {
        let vessel_state = self.state.vessel(self.vessel);
        if self.vessel == Vessel::Boil {
            let generation = self.state.boil_mode_generation();
            let mode = self.state.boil_mode();
            if generation != self.mode_generation {
                log::info!("boil mode now {}; integral reset", mode);
                self.mode_generation = generation;
                self.integral = 0.0;
                vessel_state.publish_integral(0.0);
            }
            if mode == BoilMode::Manual {
                return (self.state.manual_duty_cycle() / 100.0).clamp(0.0, 1.0);
            }
        }

        let out = pi::step(
            vessel_state.setpoint(),
            vessel_state.process_variable(),
            self.state.gains(self.vessel),
            self.period.as_secs_f64(),
            self.integral,
        );
        self.integral = out.integral;
        vessel_state.publish_integral(out.integral);
        out.fraction()
    }

    fn emergency_stop(&mut self) {
        if let Err(e) = self
            .device
            .write_digital(self.vessel.heater_line(), false)
        {
            log::error!("{} heater failed to force its line OFF: {}", self.vessel, e);
            self.state.raise_device_fault(self.vessel);
        }
        self.integral = 0.0;
        self.state.vessel(self.vessel).publish_stopped();
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn into_stats(self) -> ExecutionStats {
        self.stats
    }
}
