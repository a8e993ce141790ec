use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::console::start_console_reader;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use brau_core::timebase::Ticker;
use brau_core::{
    BoilMode, ControlError, ControlResult, Orchestrator, RecordSink, SharedControlState,
    SimulatedBrewery, SinkFactory, Vessel,
};
use brau_io::console::{SetEnabledMsg, SetLoggingMsg, SetModeMsg, SetPumpMsg};
use brau_io::metrics::{
    record_snapshot, safety_code, CONFIG_REJECTIONS, DEVICE_FAULTS, SAFETY_STATE, SAMPLES_TAKEN,
    SAMPLE_OVERRUNS, TERMINATION_TIMEOUTS,
};
use brau_io::{ConsoleCommand, FileSink};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{atomic::AtomicBool, Arc};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub fn run_from_args() -> ExitCode {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> ExitCode {
    // Initialize tracing
    let _trace_guard = init_tracing(config.json_logs, config.trace_file.as_deref());

    // Initialize metrics
    telemetry::init();

    // Start metrics server if enabled
    let metrics_enabled = config.metrics_addr.is_some();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let control_config = config.control_config();
    let device = SimulatedBrewery::new().with_divider(
        control_config.thermistor_nominal_ohms,
        control_config.thermistor_v_ref,
    );
    let orch = match Orchestrator::new(device, control_config) {
        Ok(orch) => orch.with_sink_factory(file_sinks(config.log_dir.clone())),
        Err(e) => {
            error!(error = %e, "Rejected initial inputs");
            return ExitCode::FAILURE;
        }
    };
    let state = orch.state();

    // Initialize audit logger if enabled
    let audit_logger = match init_audit_logger(config.audit_path.as_ref()) {
        Ok(logger) => logger,
        Err(e) => {
            error!(error = %e, "Audit logging requested but failed to initialize");
            return ExitCode::FAILURE;
        }
    };
    let period = orch.config().period;
    let mut session = Session {
        orch,
        audit: AuditTrail {
            logger: audit_logger,
            state: Arc::clone(&state),
        },
    };

    session.audit.record(
        AuditEventType::SystemStart,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "period_ms": period.as_millis() as u64,
            "log_interval_ms": session.orch.config().log_interval.as_millis() as u64,
            "metrics_enabled": metrics_enabled,
            "console_enabled": config.console_enabled,
        }),
    );

    info!(
        period_ms = period.as_millis() as u64,
        log_interval_ms = session.orch.config().log_interval.as_millis() as u64,
        mash_setpoint = state.vessel(Vessel::Mash).setpoint(),
        boil_setpoint = state.vessel(Vessel::Boil).setpoint(),
        "Starting brewing controller"
    );

    session.dispatch(ConsoleCommand::Connect);
    if !state.connected() {
        error!("Could not connect to the device");
        return ExitCode::FAILURE;
    }
    session.start_from_flags(&config);

    let stop = Arc::new(AtomicBool::new(false));
    let updater = telemetry::start_metrics_updater(Arc::clone(&state), Arc::clone(&stop));

    let mut console = if config.console_enabled {
        match start_console_reader() {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!(error = %e, "Console unavailable");
                None
            }
        }
    } else {
        None
    };

    let deadline = config.run_seconds.map(|secs| {
        info!(seconds = secs, "Running for limited duration");
        Instant::now() + Duration::from_secs(secs)
    });

    let mut ticker = Ticker::new(period);
    let mut reported_overruns = 0;
    loop {
        if ticker.wait(&stop).is_none() {
            break;
        }
        session.tick();

        let overruns = ticker.overruns();
        if overruns > reported_overruns {
            SAMPLE_OVERRUNS.inc_by(overruns - reported_overruns);
            reported_overruns = overruns;
        }

        if let Some(rx) = &console {
            match session.drain(rx) {
                ConsoleState::Open => {}
                ConsoleState::Quit => {
                    info!("Quit requested");
                    break;
                }
                ConsoleState::Closed if deadline.is_none() => {
                    info!("Console closed; shutting down");
                    break;
                }
                ConsoleState::Closed => console = None,
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    session.dispatch(ConsoleCommand::Disconnect);
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    let _ = updater.join();
    record_snapshot(&state.snapshot());

    info!(
        samples = SAMPLES_TAKEN.get(),
        sample_overruns = SAMPLE_OVERRUNS.get(),
        device_faults = DEVICE_FAULTS.get(),
        termination_timeouts = TERMINATION_TIMEOUTS.get(),
        config_rejections = CONFIG_REJECTIONS.get(),
        "Run complete"
    );

    session.audit.record(
        AuditEventType::SystemShutdown,
        json!({
            "samples": SAMPLES_TAKEN.get(),
            "sample_overruns": SAMPLE_OVERRUNS.get(),
            "device_faults": DEVICE_FAULTS.get(),
            "termination_timeouts": TERMINATION_TIMEOUTS.get(),
        }),
    );
    ExitCode::SUCCESS
}

/// Opens a new `brau_log_*.txt` in `dir` each time logging starts.
fn file_sinks(dir: PathBuf) -> SinkFactory {
    Box::new(move || {
        let sink = FileSink::create_in(&dir)?;
        info!(path = %sink.path().display(), "Sample log opened");
        Ok(Box::new(sink) as Box<dyn RecordSink>)
    })
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> std::io::Result<Option<Arc<AuditLogger>>> {
    audit_path
        .map(|path| {
            AuditLogger::new(path).map(|logger| {
                info!(path = %path.display(), "Audit logging enabled");
                Arc::new(logger)
            })
        })
        .transpose()
}

struct AuditTrail {
    logger: Option<Arc<AuditLogger>>,
    state: Arc<SharedControlState>,
}

impl AuditTrail {
    fn record(&self, event_type: AuditEventType, details: serde_json::Value) {
        let Some(logger) = &self.logger else {
            return;
        };
        let timebase = self.state.timebase();
        if let Err(e) = logger.log_event(timebase.now_us(), timebase.unix_us(), event_type, details) {
            warn!(error = %e, "Failed to write audit entry");
        }
    }
}

enum ConsoleState {
    Open,
    Closed,
    Quit,
}

struct Session {
    orch: Orchestrator<SimulatedBrewery>,
    audit: AuditTrail,
}

impl Session {
    /// Applies the start-up flags through the same path as console commands.
    fn start_from_flags(&mut self, config: &RuntimeConfig) {
        if config.boil_auto {
            self.dispatch(ConsoleCommand::SetMode(SetModeMsg {
                mode: BoilMode::Auto,
            }));
        }
        if config.pump {
            self.dispatch(ConsoleCommand::SetPump(SetPumpMsg { on: true }));
        }
        // Heaters start from a real reading rather than the zeroed state.
        self.tick();
        for (vessel, wanted) in [(Vessel::Mash, config.mash), (Vessel::Boil, config.boil)] {
            if wanted {
                self.dispatch(ConsoleCommand::SetEnabled(SetEnabledMsg {
                    vessel,
                    enabled: true,
                }));
            }
        }
        if config.logging {
            self.dispatch(ConsoleCommand::SetLogging(SetLoggingMsg { enabled: true }));
        }
    }

    /// One foreground period: sample, then pick up task and device faults.
    fn tick(&mut self) {
        if self.orch.snapshot().connected {
            match self.orch.sample() {
                Ok(()) => SAMPLES_TAKEN.inc(),
                Err(e) => self.report("sample", &e),
            }
        }
        if let Err(e) = self.orch.poll_health() {
            self.report("health", &e);
        }
        SAFETY_STATE.set(safety_code(self.orch.safety_state()));
    }

    fn drain(&mut self, rx: &Receiver<ConsoleCommand>) -> ConsoleState {
        loop {
            match rx.try_recv() {
                Ok(cmd) => {
                    if !self.dispatch(cmd) {
                        return ConsoleState::Quit;
                    }
                }
                Err(TryRecvError::Empty) => return ConsoleState::Open,
                Err(TryRecvError::Disconnected) => return ConsoleState::Closed,
            }
        }
    }

    /// Executes one command. Returns `false` once the operator asks to quit.
    fn dispatch(&mut self, cmd: ConsoleCommand) -> bool {
        let outcome: ControlResult<Option<(AuditEventType, serde_json::Value)>> = match cmd {
            ConsoleCommand::Connect => self
                .orch
                .connect()
                .map(|_| Some((AuditEventType::DeviceConnected, json!({})))),
            ConsoleCommand::Disconnect => self
                .orch
                .disconnect()
                .map(|_| Some((AuditEventType::DeviceDisconnected, json!({})))),
            ConsoleCommand::SetPump(msg) => self
                .orch
                .set_pump(msg.on)
                .map(|_| Some((AuditEventType::PumpChange, json!({ "on": msg.on })))),
            ConsoleCommand::SetEnabled(msg) => {
                self.orch.set_enabled(msg.vessel, msg.enabled).map(|_| {
                    let event = if msg.enabled {
                        AuditEventType::HeaterEnabled
                    } else {
                        AuditEventType::HeaterDisabled
                    };
                    Some((event, json!({ "vessel": msg.vessel })))
                })
            }
            ConsoleCommand::SetMode(msg) => self
                .orch
                .set_mode(msg.mode)
                .map(|_| Some((AuditEventType::ModeChange, json!({ "mode": msg.mode })))),
            ConsoleCommand::SetSetpoint(msg) => {
                self.orch.set_setpoint(msg.vessel, msg.value).map(|_| {
                    Some((
                        AuditEventType::ConfigChange,
                        json!({ "setpoint": msg.vessel, "value": msg.value }),
                    ))
                })
            }
            ConsoleCommand::SetManualDutyCycle(msg) => {
                self.orch.set_manual_duty_cycle(msg.value).map(|_| {
                    Some((
                        AuditEventType::ConfigChange,
                        json!({ "manual_duty_cycle": msg.value }),
                    ))
                })
            }
            ConsoleCommand::SetOptimizerWeights(msg) => {
                self.orch.set_optimizer_weights(msg.mash_weight).map(|_| {
                    Some((
                        AuditEventType::ConfigChange,
                        json!({ "mash_weight": msg.mash_weight }),
                    ))
                })
            }
            ConsoleCommand::SetLogging(msg) => self.orch.set_logging(msg.enabled).map(|_| {
                let event = if msg.enabled {
                    AuditEventType::LoggingStarted
                } else {
                    AuditEventType::LoggingStopped
                };
                Some((event, json!({})))
            }),
            ConsoleCommand::Adjust(msg) => {
                let value = self.orch.adjust_input(msg.input, msg.delta);
                info!(input = %msg.input, value, "Staged input adjusted");
                Ok(None)
            }
            ConsoleCommand::ApplyInputs => {
                let staged = *self.orch.staged_inputs();
                self.orch
                    .apply_inputs()
                    .map(|_| Some((AuditEventType::ConfigChange, json!({ "staged": staged }))))
            }
            ConsoleCommand::Status => {
                let status = json!({
                    "type": "status",
                    "snapshot": self.orch.snapshot(),
                    "staged": self.orch.staged_inputs(),
                    "safety": self.orch.safety_state(),
                });
                println!("{}", status);
                Ok(None)
            }
            ConsoleCommand::Quit => return false,
        };

        match outcome {
            Ok(Some((event, details))) => {
                info!(command = cmd.name(), "Command applied");
                self.audit.record(event, details);
            }
            Ok(None) => {}
            Err(e) => self.report(cmd.name(), &e),
        }
        true
    }

    fn report(&self, context: &str, err: &ControlError) {
        match err {
            ControlError::Config(_) => {
                CONFIG_REJECTIONS.inc();
                warn!(command = context, error = %err, "Command rejected");
                self.audit.record(
                    AuditEventType::ConfigRejected,
                    json!({ "command": context, "reason": err.to_string() }),
                );
            }
            ControlError::TerminationTimeout { task, waited } => {
                TERMINATION_TIMEOUTS.inc();
                error!(task = %task, waited_ms = waited.as_millis() as u64, "Task did not stop in time");
                self.audit.record(
                    AuditEventType::TerminationTimeout,
                    json!({ "task": task, "waited_ms": waited.as_millis() as u64 }),
                );
            }
            e if e.is_device_fault() => {
                DEVICE_FAULTS.inc();
                error!(context, error = %err, "Device fault; all outputs OFF");
                self.audit.record(
                    AuditEventType::DeviceFault,
                    json!({ "context": context, "error": err.to_string() }),
                );
            }
            _ => warn!(command = context, error = %err, "Command failed"),
        }
    }
}
