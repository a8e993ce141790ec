//! Prometheus metrics for the brewing controller.
//!
//! Gauges mirror the sample-log columns; counters track the control engine's
//! health events. Everything is read-only: the HTTP endpoint never accepts
//! commands.

use brau_core::state::ControlSnapshot;
use brau_core::supervisor::SafetyState;
use brau_core::tags;
use brau_core::vessel::BoilMode;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn gauge(tag: tags::Tag, help: &str) -> Gauge {
    let gauge = Gauge::new(tag.metric, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

// ============================================================================
// Process State Metrics
// ============================================================================

pub static MASH_TEMP: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::MASH_TEMP, "Filtered mash tun temperature in °F"));

pub static BOIL_TEMP: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_TEMP, "Filtered boil kettle temperature in °F"));

pub static HEATER_TEMP: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::HEATER_TEMP, "Filtered RIMS heater outlet temperature in °F"));

pub static MASH_SETPOINT: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::MASH_SETPOINT, "Active mash setpoint in °F"));

pub static BOIL_SETPOINT: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_SETPOINT, "Active boil setpoint in °F"));

// ============================================================================
// Actuation Metrics
// ============================================================================

pub static PUMP_ON: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::PUMP, "Pump status (1=on, 0=off)"));

pub static MASH_HEATER_ENABLED: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::MASH_HEATER, "Mash heater enabled (1=yes, 0=no)"));

pub static BOIL_HEATER_ENABLED: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_HEATER, "Boil heater enabled (1=yes, 0=no)"));

pub static BOIL_MODE_AUTO: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_MODE, "Boil control mode (1=auto, 0=manual)"));

pub static BOIL_DC_MANUAL: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_DC_MANUAL, "Operator boil duty cycle in percent"));

pub static BOIL_DC_ACTUAL: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_DC_ACTUAL, "Scheduled boil duty cycle in percent"));

pub static MASH_DC_ACTUAL: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::MASH_DC_ACTUAL, "Scheduled mash duty cycle in percent"));

pub static MASH_INTEGRAL: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::MASH_INTEGRAL, "Mash PI error integral"));

pub static BOIL_INTEGRAL: LazyLock<Gauge> =
    LazyLock::new(|| gauge(tags::BOIL_INTEGRAL, "Boil PI error integral"));

pub static OPTIMIZER_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        tags::OPTIMIZER_ACTIVE,
        "Duty cycles redistributed this period (1=yes, 0=no)",
    )
});

// ============================================================================
// Health Metrics
// ============================================================================

/// Device connection status (1 = connected, 0 = disconnected)
pub static DEVICE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "brau_device_connected",
        "Device connection status (1=connected, 0=disconnected)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Safety state (0=normal,1=degraded,2=trip)
pub static SAFETY_STATE: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new("brau_safety_state", "Safety state (0=normal,1=degraded,2=trip)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static SAMPLES_TAKEN: LazyLock<IntCounter> =
    LazyLock::new(|| counter("brau_samples_total", "Temperature sampling passes completed"));

pub static SAMPLE_OVERRUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "brau_sample_overruns_total",
        "Sampling periods started late",
    )
});

pub static DEVICE_FAULTS: LazyLock<IntCounter> =
    LazyLock::new(|| counter("brau_device_faults_total", "Device faults taken to the safe state"));

pub static TERMINATION_TIMEOUTS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "brau_termination_timeouts_total",
        "Heater tasks that failed to stop in time",
    )
});

pub static CONFIG_REJECTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "brau_config_rejections_total",
        "Commands rejected for out-of-range arguments",
    )
});

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

pub fn safety_code(state: SafetyState) -> f64 {
    match state {
        SafetyState::Normal => 0.0,
        SafetyState::Degraded => 1.0,
        SafetyState::Trip => 2.0,
    }
}

/// Copies a shared-state snapshot into the gauges.
pub fn record_snapshot(snapshot: &ControlSnapshot) {
    MASH_TEMP.set(snapshot.mash.process_variable);
    BOIL_TEMP.set(snapshot.boil.process_variable);
    HEATER_TEMP.set(snapshot.heater_temp);
    MASH_SETPOINT.set(snapshot.mash.setpoint);
    BOIL_SETPOINT.set(snapshot.boil.setpoint);
    PUMP_ON.set(flag(snapshot.pump_on));
    MASH_HEATER_ENABLED.set(flag(snapshot.mash.enabled));
    BOIL_HEATER_ENABLED.set(flag(snapshot.boil.enabled));
    BOIL_MODE_AUTO.set(flag(snapshot.boil_mode == BoilMode::Auto));
    BOIL_DC_MANUAL.set(snapshot.manual_duty_cycle);
    BOIL_DC_ACTUAL.set(snapshot.boil.duty_cycle_resolved);
    MASH_DC_ACTUAL.set(snapshot.mash.duty_cycle_resolved);
    MASH_INTEGRAL.set(snapshot.mash.error_integral);
    BOIL_INTEGRAL.set(snapshot.boil.error_integral);
    OPTIMIZER_ACTIVE.set(flag(snapshot.optimizer_active));
    DEVICE_CONNECTED.set(flag(snapshot.connected));
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();
                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }
                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the device is connected and sampled.
                    if DEVICE_CONNECTED.get() > 0.0 && SAMPLES_TAKEN.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    for gauge in [
        &MASH_TEMP,
        &BOIL_TEMP,
        &HEATER_TEMP,
        &MASH_SETPOINT,
        &BOIL_SETPOINT,
        &PUMP_ON,
        &MASH_HEATER_ENABLED,
        &BOIL_HEATER_ENABLED,
        &BOIL_MODE_AUTO,
        &BOIL_DC_MANUAL,
        &BOIL_DC_ACTUAL,
        &MASH_DC_ACTUAL,
        &MASH_INTEGRAL,
        &BOIL_INTEGRAL,
        &OPTIMIZER_ACTIVE,
        &DEVICE_CONNECTED,
        &SAFETY_STATE,
    ] {
        let _ = gauge.get();
    }
    for counter in [
        &SAMPLES_TAKEN,
        &SAMPLE_OVERRUNS,
        &DEVICE_FAULTS,
        &TERMINATION_TIMEOUTS,
        &CONFIG_REJECTIONS,
    ] {
        let _ = counter.get();
    }
}
