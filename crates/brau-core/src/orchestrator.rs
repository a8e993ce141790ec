//! Owner of the shared state and of every task's lifecycle.
//!
//! All commands enter here. The orchestrator is the only writer of the
//! connection, pump, enable, mode and input fields of the shared state and the
//! only place that starts or stops tasks.

use crate::control_loop::{ControlConfig, ExecutionStats, HeaterLoop};
use crate::error::{ControlError, ControlResult, DeviceError, TaskKind};
use crate::filter::TemperatureFilter;
use crate::hal::{AnalogChannel, BrewDevice, DataFormat, DeviceHandle, DigitalLine, TemperatureUnit};
use crate::inputs::{InputField, StagedInputs};
use crate::limits::Setting;
use crate::logger::{SampleLogger, SinkFactory};
use crate::optimizer::OptimizerWeights;
use crate::state::{ControlSnapshot, SharedControlState};
use crate::supervisor::{SafetyState, SafetySupervisor};
use crate::task::TaskHandle;
use crate::thermistor::{BetaThermistor, Thermistor};
use crate::timebase::TimeBase;
use crate::vessel::{BoilMode, Vessel};
use std::io;
use std::sync::Arc;

pub struct Orchestrator<D: BrewDevice + 'static> {
    config: ControlConfig,
    device: DeviceHandle<D>,
    state: Arc<SharedControlState>,
    thermistor: Box<dyn Thermistor>,
    filters: [TemperatureFilter; 3],
    heaters: [Option<TaskHandle<ExecutionStats>>; 2],
    logger: Option<TaskHandle<io::Result<u64>>>,
    sinks: Option<SinkFactory>,
    staged: StagedInputs,
    supervisor: SafetySupervisor,
}

impl<D: BrewDevice + 'static> Orchestrator<D> {
    /// Builds a disconnected controller with the configured initial inputs
    /// already committed.
    pub fn new(device: D, config: ControlConfig) -> ControlResult<Self> {
        let config = config.normalized();
        let state = Arc::new(SharedControlState::new(
            TimeBase::new(),
            config.mash_gains,
            config.boil_gains,
        ));
        let filter = TemperatureFilter::for_period(config.period, config.filter_cutoff_hz);
        let mut orchestrator = Self {
            thermistor: Box::new(BetaThermistor {
                beta: config.thermistor_beta,
            }),
            filters: [filter; 3],
            device: DeviceHandle::new(device),
            state,
            heaters: [None, None],
            logger: None,
            sinks: None,
            staged: config.initial_inputs,
            supervisor: SafetySupervisor::new(),
            config,
        };
        orchestrator.apply_inputs()?;
        Ok(orchestrator)
    }

    pub fn with_sink_factory(mut self, sinks: SinkFactory) -> Self {
        self.sinks = Some(sinks);
        self
    }

    pub fn with_thermistor(mut self, thermistor: impl Thermistor + 'static) -> Self {
        self.thermistor = Box::new(thermistor);
        self
    }

    pub fn state(&self) -> Arc<SharedControlState> {
        Arc::clone(&self.state)
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        self.state.snapshot()
    }

    pub fn device(&self) -> &DeviceHandle<D> {
        &self.device
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn staged_inputs(&self) -> &StagedInputs {
        &self.staged
    }

    pub fn safety_state(&self) -> SafetyState {
        self.supervisor.state()
    }

    pub fn is_running(&self, vessel: Vessel) -> bool {
        self.heaters[vessel.slot()].is_some()
    }

    fn require_connected(&self) -> ControlResult<()> {
        if self.state.connected() {
            Ok(())
        } else {
            Err(ControlError::NotConnected)
        }
    }

    /// Opens the device, selects binary Fahrenheit output and drives every
    /// line OFF. Clears any latched faults.
    pub fn connect(&mut self) -> ControlResult<()> {
        if self.state.connected() {
            return Ok(());
        }
        let opened = {
            let mut device = self.device.lock();
            device
                .connect()
                .and_then(|_| device.set_output_mode(DataFormat::Binary, TemperatureUnit::Fahrenheit))
        };
        if let Err(e) = opened.and_then(|_| self.device.force_all_off()) {
            log::error!("connect failed: {}", e);
            let _ = self.device.force_all_off();
            let _ = self.device.lock().disconnect();
            return Err(e.into());
        }

        self.supervisor.reset();
        self.state.clear_device_fault();
        for filter in &mut self.filters {
            filter.reset();
        }
        self.state.set_pump(false);
        self.state.set_connected(true);
        log::info!("device connected; all outputs OFF");
        Ok(())
    }

    /// Stops every task, forces all outputs OFF and closes the device.
    ///
    /// Every step is attempted even if an earlier one fails; the first error
    /// is returned after the controller is marked disconnected.
    pub fn disconnect(&mut self) -> ControlResult<()> {
        if !self.state.connected() {
            return Ok(());
        }
        let mut first_err = self.stop_tasks().err();

        if let Err(e) = self.device.force_all_off() {
            first_err.get_or_insert(e.into());
        }
        if let Err(e) = self.device.lock().disconnect() {
            log::error!("device disconnect failed: {}", e);
            first_err.get_or_insert(e.into());
        }
        self.mark_disconnected();
        log::info!("device disconnected");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn mark_disconnected(&mut self) {
        self.state.set_pump(false);
        for vessel in Vessel::ALL {
            self.state.vessel(vessel).set_enabled(false);
        }
        self.state.set_manual_duty_cycle(0.0);
        self.staged.manual_duty_cycle = 0.0;
        self.state.set_connected(false);
    }

    /// Stops the logger and both heaters, returning the first failure.
    fn stop_tasks(&mut self) -> ControlResult<()> {
        let mut first_err = self.stop_logger().err();
        for vessel in Vessel::ALL {
            if let Err(e) = self.stop_heater(vessel) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn set_pump(&mut self, on: bool) -> ControlResult<()> {
        self.require_connected()?;
        if on {
            self.write_line(DigitalLine::Pump, true)?;
            self.state.set_pump(true);
            log::info!("pump ON");
            return Ok(());
        }
        // No heating without flow through the heater chamber.
        let stopped = self.stop_heater(Vessel::Mash);
        self.state.set_pump(false);
        self.write_line(DigitalLine::Pump, false)?;
        log::info!("pump OFF");
        stopped
    }

    pub fn set_enabled(&mut self, vessel: Vessel, enabled: bool) -> ControlResult<()> {
        if !enabled {
            return self.stop_heater(vessel);
        }
        self.require_connected()?;
        self.supervisor.check_enable(vessel)?;
        if vessel == Vessel::Mash && !self.state.pump_on() {
            return Err(ControlError::Interlock {
                what: "mash heater requires the pump",
            });
        }
        if self.heaters[vessel.slot()].is_some() {
            return Ok(());
        }

        let vessel_state = self.state.vessel(vessel);
        vessel_state.publish_stopped();
        vessel_state.set_enabled(true);
        let mut task = HeaterLoop::new(vessel, self.device.clone(), self.state(), self.config.period);
        match TaskHandle::spawn(TaskKind::Heater(vessel), move |stop| {
            task.run(stop);
            task.into_stats()
        }) {
            Ok(handle) => {
                self.heaters[vessel.slot()] = Some(handle);
                log::info!("{} heater enabled", vessel);
                Ok(())
            }
            Err(e) => {
                vessel_state.set_enabled(false);
                Err(e)
            }
        }
    }

    /// Stops a heater task and confirms its line is OFF.
    ///
    /// A task that outlives the termination timeout latches a safety fault
    /// for its vessel and its line is forced OFF from here.
    fn stop_heater(&mut self, vessel: Vessel) -> ControlResult<()> {
        self.state.vessel(vessel).set_enabled(false);
        let Some(handle) = self.heaters[vessel.slot()].take() else {
            return Ok(());
        };
        match handle.stop_and_join(self.config.termination_timeout()) {
            Ok(stats) => {
                log::info!(
                    "{} heater stopped after {} periods ({} overrun, max jitter {} us, {} redistributed)",
                    vessel,
                    stats.periods_executed,
                    stats.periods_overrun,
                    stats.max_jitter_us,
                    stats.redistributed_periods
                );
                Ok(())
            }
            Err(e) => {
                log::error!("{} heater: {}; forcing its line OFF", vessel, e);
                self.supervisor.trip_vessel(vessel);
                if let Err(write_err) = self.device.write_digital(vessel.heater_line(), false) {
                    log::error!("failed to force {} heater OFF: {}", vessel, write_err);
                }
                Err(e)
            }
        }
    }

    pub fn set_mode(&mut self, mode: BoilMode) -> ControlResult<()> {
        self.require_connected()?;
        if self.state.boil_mode() != mode {
            self.state.set_boil_mode(mode);
            log::info!("boil mode set to {}", mode);
        }
        Ok(())
    }

    pub fn set_setpoint(&mut self, vessel: Vessel, value: f64) -> ControlResult<()> {
        let value = Setting::new(value)
            .validate(self.config.limits.setpoint(vessel))?
            .value();
        self.state.vessel(vessel).set_setpoint(value);
        Ok(())
    }

    pub fn set_manual_duty_cycle(&mut self, percent: f64) -> ControlResult<()> {
        let percent = Setting::new(percent)
            .validate(&self.config.limits.manual_duty_cycle)?
            .value();
        self.state.set_manual_duty_cycle(percent);
        Ok(())
    }

    /// Sets the mash weight as a fraction; the boil weight is its complement.
    pub fn set_optimizer_weights(&mut self, mash_weight: f64) -> ControlResult<()> {
        let weights = OptimizerWeights::new(mash_weight)?;
        self.state.set_weights(weights);
        Ok(())
    }

    pub fn set_logging(&mut self, on: bool) -> ControlResult<()> {
        if !on {
            return self.stop_logger();
        }
        self.require_connected()?;
        if self.logger.is_some() {
            return Ok(());
        }
        let factory = self.sinks.as_ref().ok_or_else(|| {
            ControlError::Sink(io::Error::new(
                io::ErrorKind::NotFound,
                "no sample sink configured",
            ))
        })?;
        let sink = factory()?;
        let mut logger = SampleLogger::new(self.state(), sink, self.config.log_interval);
        let handle = TaskHandle::spawn(TaskKind::Logger, move |stop| logger.run(stop))?;
        self.logger = Some(handle);
        self.state.set_logging(true);
        log::info!("sample logging started every {:?}", self.config.log_interval);
        Ok(())
    }

    fn stop_logger(&mut self) -> ControlResult<()> {
        self.state.set_logging(false);
        let Some(handle) = self.logger.take() else {
            return Ok(());
        };
        let timeout = self.config.log_interval + self.config.termination_grace;
        match handle.stop_and_join(timeout)? {
            Ok(records) => {
                log::info!("sample logging stopped after {} records", records);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Steps a staged input, saturating at its range. Nothing is committed.
    pub fn adjust_input(&mut self, field: InputField, delta: f64) -> f64 {
        self.staged.adjust(field, delta, &self.config.limits)
    }

    /// Commits every staged input. Either all values are taken or none is.
    pub fn apply_inputs(&mut self) -> ControlResult<()> {
        let limits = &self.config.limits;
        let staged = self.staged;
        let mash_sp = Setting::new(staged.mash_setpoint)
            .validate(&limits.mash_setpoint)?
            .value();
        let boil_sp = Setting::new(staged.boil_setpoint)
            .validate(&limits.boil_setpoint)?
            .value();
        let manual = Setting::new(staged.manual_duty_cycle)
            .validate(&limits.manual_duty_cycle)?
            .value();
        let weight_pct = Setting::new(staged.mash_weight_pct)
            .validate(&limits.mash_weight_pct)?
            .value();
        let weights = OptimizerWeights::from_percent(weight_pct)?;

        self.state.vessel(Vessel::Mash).set_setpoint(mash_sp);
        self.state.vessel(Vessel::Boil).set_setpoint(boil_sp);
        self.state.set_manual_duty_cycle(manual);
        self.state.set_weights(weights);
        Ok(())
    }

    /// Reads, converts and filters every temperature channel once.
    pub fn sample(&mut self) -> ControlResult<()> {
        self.require_connected()?;
        for (slot, channel) in AnalogChannel::ALL.into_iter().enumerate() {
            let reading = self.device.read_analog(channel).and_then(|voltage| {
                self.thermistor.voltage_to_fahrenheit(
                    self.config.thermistor_nominal_ohms,
                    self.config.thermistor_v_ref,
                    voltage,
                )
            });
            let raw = match reading {
                Ok(raw) => raw,
                Err(e) => return Err(self.device_fault(e)),
            };
            let filtered = self.filters[slot].update(raw);
            match channel {
                AnalogChannel::MashTemp => self.state.vessel(Vessel::Mash).set_process_variable(filtered),
                AnalogChannel::BoilTemp => self.state.vessel(Vessel::Boil).set_process_variable(filtered),
                AnalogChannel::HeaterTemp => self.state.set_heater_temp(filtered),
            }
        }
        Ok(())
    }

    /// Picks up faults raised by tasks and tasks that ended on their own.
    pub fn poll_health(&mut self) -> ControlResult<()> {
        if !self.state.connected() {
            return Ok(());
        }
        if let Some(vessel) = self.state.device_fault() {
            return Err(self.device_fault(DeviceError::HeaterFault { vessel }));
        }
        if !self.device.lock().is_healthy() {
            return Err(self.device_fault(DeviceError::Unhealthy));
        }

        for vessel in Vessel::ALL {
            let finished = self.heaters[vessel.slot()]
                .as_ref()
                .is_some_and(|h| h.is_finished());
            if !finished {
                continue;
            }
            if let Some(handle) = self.heaters[vessel.slot()].take() {
                self.state.vessel(vessel).set_enabled(false);
                let result = handle.join();
                self.supervisor.trip_vessel(vessel);
                let _ = self.device.write_digital(vessel.heater_line(), false);
                if let Err(e) = result {
                    log::error!("{}; {} heater latched out", e, vessel);
                    return Err(e);
                }
                log::warn!("{} heater task exited unexpectedly; latched out", vessel);
            }
        }

        if self.logger.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.logger.take() {
                self.state.set_logging(false);
                match handle.join()? {
                    Ok(records) => log::warn!("sample logger exited after {} records", records),
                    Err(e) => {
                        log::error!("sample logger failed: {}", e);
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Takes the controller to its safe state after a device failure.
    /// No reconnect is attempted.
    fn device_fault(&mut self, err: DeviceError) -> ControlError {
        log::error!("device fault: {}; all outputs OFF, heaters disabled", err);
        self.supervisor.trip_device();
        if let Err(e) = self.stop_tasks() {
            log::error!("while stopping tasks after device fault: {}", e);
        }
        let _ = self.device.force_all_off();
        let _ = self.device.lock().disconnect();
        self.mark_disconnected();
        ControlError::Device(err)
    }

    /// Disconnects if connected. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.disconnect() {
            log::error!("shutdown: {}", e);
        }
    }

    fn write_line(&mut self, line: DigitalLine, on: bool) -> ControlResult<()> {
        match self.device.write_digital(line, on) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.device_fault(e)),
        }
    }
}

impl<D: BrewDevice + 'static> Drop for Orchestrator<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal_sim::SimulatedBrewery;
    use crate::logger::testing::MemorySink;
    use crate::logger::RecordSink;
    use std::thread;
    use std::time::Duration;

    fn fast_config() -> ControlConfig {
        ControlConfig {
            period: Duration::from_millis(40),
            log_interval: Duration::from_millis(40),
            termination_grace: Duration::from_millis(60),
            ..ControlConfig::default()
        }
    }

    fn connected() -> Orchestrator<SimulatedBrewery> {
        let sim = SimulatedBrewery::new().with_temperatures(140.0, 140.0, 150.0);
        let mut orch = Orchestrator::new(sim, fast_config()).unwrap();
        orch.connect().unwrap();
        orch
    }

    fn line(orch: &Orchestrator<SimulatedBrewery>, line: DigitalLine) -> bool {
        orch.device().lock().digital(line)
    }

    #[test]
    fn connect_selects_output_mode_and_zeroes_outputs() {
        let orch = connected();
        let device = orch.device().lock();
        assert_eq!(
            device.output_mode(),
            Some((DataFormat::Binary, TemperatureUnit::Fahrenheit))
        );
        assert!(DigitalLine::ALL.iter().all(|l| !device.digital(*l)));
        drop(device);
        assert!(orch.snapshot().connected);
        assert_eq!(orch.snapshot().mash.setpoint, 154.0);
        assert_eq!(orch.snapshot().boil.setpoint, 170.0);
    }

    #[test]
    fn commands_require_connection() {
        let mut orch = Orchestrator::new(SimulatedBrewery::new(), fast_config()).unwrap();
        assert!(matches!(orch.set_pump(true), Err(ControlError::NotConnected)));
        assert!(matches!(
            orch.set_enabled(Vessel::Boil, true),
            Err(ControlError::NotConnected)
        ));
        assert!(orch.sample().is_err());
    }

    #[test]
    fn mash_requires_pump() {
        let mut orch = connected();
        assert!(matches!(
            orch.set_enabled(Vessel::Mash, true),
            Err(ControlError::Interlock { .. })
        ));
        assert!(!orch.is_running(Vessel::Mash));
    }

    #[test]
    fn pump_off_disables_mash_and_resets_integral() {
        let mut orch = connected();
        orch.set_pump(true).unwrap();
        orch.sample().unwrap();
        orch.set_enabled(Vessel::Mash, true).unwrap();
        thread::sleep(Duration::from_millis(150));
        assert!(orch.snapshot().mash.error_integral > 0.0);

        orch.set_pump(false).unwrap();
        let snap = orch.snapshot();
        assert!(!snap.mash.enabled);
        assert_eq!(snap.mash.error_integral, 0.0);
        assert!(!orch.is_running(Vessel::Mash));
        assert!(!line(&orch, DigitalLine::MashHeater));
        assert!(!line(&orch, DigitalLine::Pump));
    }

    #[test]
    fn rejected_setpoint_keeps_previous_value() {
        let mut orch = connected();
        orch.set_setpoint(Vessel::Boil, 200.0).unwrap();
        assert!(matches!(
            orch.set_setpoint(Vessel::Boil, 250.0),
            Err(ControlError::Config(_))
        ));
        assert!(orch.set_setpoint(Vessel::Mash, f64::NAN).is_err());
        assert!(orch.set_optimizer_weights(1.0).is_err());
        assert!(orch.set_manual_duty_cycle(101.0).is_err());
        let snap = orch.snapshot();
        assert_eq!(snap.boil.setpoint, 200.0);
        assert_eq!(snap.mash.setpoint, 154.0);
        assert_eq!(snap.weight_mash, 0.5);
        assert_eq!(snap.manual_duty_cycle, 0.0);
    }

    #[test]
    fn staged_inputs_commit_together() {
        let mut orch = connected();
        assert_eq!(orch.adjust_input(InputField::MashSetpoint, -10.0), 144.0);
        assert_eq!(orch.adjust_input(InputField::ManualDutyCycle, 10.0), 10.0);
        assert_eq!(orch.adjust_input(InputField::MashWeight, 1.0), 51.0);
        assert_eq!(orch.snapshot().mash.setpoint, 154.0);
        orch.apply_inputs().unwrap();
        let snap = orch.snapshot();
        assert_eq!(snap.mash.setpoint, 144.0);
        assert_eq!(snap.manual_duty_cycle, 10.0);
        assert!((snap.weight_mash - 0.51).abs() < 1e-12);
    }

    #[test]
    fn disconnect_mid_cycle_leaves_outputs_off() {
        let mut orch = connected();
        orch.set_pump(true).unwrap();
        orch.sample().unwrap();
        orch.set_manual_duty_cycle(70.0).unwrap();
        orch.set_enabled(Vessel::Mash, true).unwrap();
        orch.set_enabled(Vessel::Boil, true).unwrap();
        thread::sleep(Duration::from_millis(130));

        orch.disconnect().unwrap();
        let device = orch.device().lock();
        assert!(!device.is_connected());
        assert!(DigitalLine::ALL.iter().all(|l| !device.digital(*l)));
        drop(device);
        let snap = orch.snapshot();
        assert!(!snap.connected);
        assert!(!snap.mash.enabled && !snap.boil.enabled);
        assert_eq!(snap.manual_duty_cycle, 0.0);
    }

    #[test]
    fn heaters_share_the_period() {
        let mut orch = connected();
        orch.set_pump(true).unwrap();
        orch.set_setpoint(Vessel::Mash, 180.0).unwrap();
        orch.sample().unwrap();
        orch.set_manual_duty_cycle(100.0).unwrap();
        orch.set_enabled(Vessel::Mash, true).unwrap();
        orch.set_enabled(Vessel::Boil, true).unwrap();
        thread::sleep(Duration::from_millis(200));
        let snap = orch.snapshot();
        assert!(snap.optimizer_active);
        let total = snap.mash.duty_cycle_resolved + snap.boil.duty_cycle_resolved;
        assert!((total - 100.0).abs() < 1e-6);
    }

    #[test]
    fn mode_switch_is_observed_by_boil_task() {
        let mut orch = connected();
        orch.sample().unwrap();
        orch.set_setpoint(Vessel::Boil, 212.0).unwrap();
        orch.set_mode(BoilMode::Auto).unwrap();
        orch.set_enabled(Vessel::Boil, true).unwrap();
        thread::sleep(Duration::from_millis(150));
        assert!(orch.snapshot().boil.error_integral > 0.0);
        orch.set_mode(BoilMode::Manual).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(orch.snapshot().boil.error_integral, 0.0);
    }

    #[test]
    fn device_fault_disables_everything() {
        let mut orch = connected();
        let faults = orch.device().lock().fault_switch();
        orch.set_manual_duty_cycle(50.0).unwrap();
        orch.set_enabled(Vessel::Boil, true).unwrap();
        thread::sleep(Duration::from_millis(60));

        faults.trip();
        assert!(orch.sample().unwrap_err().is_device_fault());
        let snap = orch.snapshot();
        assert!(!snap.connected);
        assert!(!snap.boil.enabled);
        assert!(!orch.is_running(Vessel::Boil));
        assert_eq!(orch.safety_state(), SafetyState::Trip);

        faults.clear();
        orch.connect().unwrap();
        assert_eq!(orch.safety_state(), SafetyState::Normal);
        assert!(DigitalLine::ALL.iter().all(|l| !line(&orch, *l)));
    }

    #[test]
    fn task_fault_is_picked_up_by_health_poll() {
        let mut orch = connected();
        orch.set_manual_duty_cycle(50.0).unwrap();
        orch.set_enabled(Vessel::Boil, true).unwrap();
        orch.state.raise_device_fault(Vessel::Boil);
        let err = orch.poll_health().unwrap_err();
        assert!(matches!(
            err,
            ControlError::Device(DeviceError::HeaterFault { vessel: Vessel::Boil })
        ));
        assert!(!orch.snapshot().connected);
    }

    #[test]
    fn logging_writes_records_until_stopped() {
        let sink = MemorySink::default();
        let records = sink.records.clone();
        let factory: SinkFactory = Box::new(move || Ok(Box::new(sink.clone()) as Box<dyn RecordSink>));
        let mut orch = Orchestrator::new(SimulatedBrewery::new(), fast_config())
            .unwrap()
            .with_sink_factory(factory);
        assert!(orch.set_logging(true).is_err());
        orch.connect().unwrap();
        orch.set_logging(true).unwrap();
        assert!(orch.snapshot().logging);
        thread::sleep(Duration::from_millis(150));
        orch.set_logging(false).unwrap();
        assert!(!orch.snapshot().logging);
        assert!(records.lock().unwrap().len() >= 2);
    }

    #[test]
    fn logging_without_sink_is_rejected() {
        let mut orch = connected();
        assert!(matches!(orch.set_logging(true), Err(ControlError::Sink(_))));
        assert!(!orch.snapshot().logging);
    }

    #[test]
    fn hung_task_trips_its_vessel() {
        let mut orch = connected();
        let handle = TaskHandle::spawn(TaskKind::Heater(Vessel::Boil), |_stop| {
            thread::sleep(Duration::from_millis(400));
            ExecutionStats::default()
        })
        .unwrap();
        orch.heaters[Vessel::Boil.slot()] = Some(handle);
        orch.device().write_digital(DigitalLine::BoilHeater, true).unwrap();

        let err = orch.set_enabled(Vessel::Boil, false).unwrap_err();
        assert!(matches!(err, ControlError::TerminationTimeout { .. }));
        assert!(!line(&orch, DigitalLine::BoilHeater));
        assert_eq!(orch.safety_state(), SafetyState::Degraded);
        assert!(matches!(
            orch.set_enabled(Vessel::Boil, true),
            Err(ControlError::VesselFaulted { .. })
        ));
    }
}
