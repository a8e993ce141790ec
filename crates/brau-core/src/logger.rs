//! Periodic sample logger.
//!
//! The logger only reads the shared state; a slow sink delays the next record
//! but never a heater task.

use crate::state::{ControlSnapshot, SharedControlState};
use crate::tags::{Tag, RECORD_COLUMNS};
use crate::timebase::Ticker;
use crate::vessel::{BoilMode, Vessel};
use serde::Serialize;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Destination for sample records.
pub trait RecordSink: Send {
    /// Called once before the first record.
    fn begin(&mut self, columns: &[Tag]) -> io::Result<()>;
    fn append(&mut self, record: &SampleRecord) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

/// Opens a fresh sink each time logging is switched on.
pub type SinkFactory = Box<dyn Fn() -> io::Result<Box<dyn RecordSink>> + Send>;

/// One row of the sample log, in column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    pub elapsed_seconds: f64,
    pub pump: bool,
    pub mash_heater: bool,
    pub boil_heater: bool,
    pub mash_temp: f64,
    pub boil_temp: f64,
    pub heater_temp: f64,
    pub boil_mode: BoilMode,
    pub mash_setpoint: f64,
    pub boil_setpoint: f64,
    pub boil_dc_manual: f64,
    pub boil_dc_actual: f64,
    pub mash_dc_actual: f64,
    pub mash_integral: f64,
    pub boil_integral: f64,
    pub optimizer_active: bool,
}

impl SampleRecord {
    pub fn capture(snapshot: &ControlSnapshot, elapsed: Duration) -> Self {
        let mash = snapshot.vessel(Vessel::Mash);
        let boil = snapshot.vessel(Vessel::Boil);
        Self {
            elapsed_seconds: elapsed.as_secs_f64(),
            pump: snapshot.pump_on,
            mash_heater: mash.enabled,
            boil_heater: boil.enabled,
            mash_temp: mash.process_variable,
            boil_temp: boil.process_variable,
            heater_temp: snapshot.heater_temp,
            boil_mode: snapshot.boil_mode,
            mash_setpoint: mash.setpoint,
            boil_setpoint: boil.setpoint,
            boil_dc_manual: snapshot.manual_duty_cycle,
            boil_dc_actual: boil.duty_cycle_resolved,
            mash_dc_actual: mash.duty_cycle_resolved,
            mash_integral: mash.error_integral,
            boil_integral: boil.error_integral,
            optimizer_active: snapshot.optimizer_active,
        }
    }

    /// Space-separated columns, flags as 0/1, boil mode as 1 for auto.
    pub fn to_line(&self) -> String {
        format!(
            "{:.1} {} {} {} {:.1} {:.1} {:.1} {} {:.1} {:.1} {:.0} {:.1} {:.1} {:.3} {:.3} {}",
            self.elapsed_seconds,
            flag(self.pump),
            flag(self.mash_heater),
            flag(self.boil_heater),
            self.mash_temp,
            self.boil_temp,
            self.heater_temp,
            flag(self.boil_mode == BoilMode::Auto),
            self.mash_setpoint,
            self.boil_setpoint,
            self.boil_dc_manual,
            self.boil_dc_actual,
            self.mash_dc_actual,
            self.mash_integral,
            self.boil_integral,
            flag(self.optimizer_active),
        )
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Column header line matching [`SampleRecord::to_line`].
pub fn header_line(columns: &[Tag]) -> String {
    columns
        .iter()
        .map(|tag| tag.header)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct SampleLogger {
    state: Arc<SharedControlState>,
    sink: Box<dyn RecordSink>,
    interval: Duration,
    records: u64,
}

impl SampleLogger {
    pub fn new(state: Arc<SharedControlState>, sink: Box<dyn RecordSink>, interval: Duration) -> Self {
        Self {
            state,
            sink,
            interval,
            records: 0,
        }
    }

    /// Writes one record per interval until `stop`. Returns the record count.
    pub fn run(&mut self, stop: &AtomicBool) -> io::Result<u64> {
        let started = Instant::now();
        self.sink.begin(&RECORD_COLUMNS)?;
        let mut ticker = Ticker::new(self.interval);
        let result = loop {
            if ticker.wait(stop).is_none() {
                break Ok(());
            }
            let record = SampleRecord::capture(&self.state.snapshot(), started.elapsed());
            if let Err(e) = self.sink.append(&record) {
                break Err(e);
            }
            self.records += 1;
        };
        if ticker.overruns() > 0 {
            log::warn!("sample logger fell behind {} times", ticker.overruns());
        }
        let finished = self.sink.finish();
        result.and(finished).map(|_| self.records)
    }

    pub fn records(&self) -> u64 {
        self.records
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps records in memory.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub records: Arc<Mutex<Vec<SampleRecord>>>,
        pub header: Arc<Mutex<Option<String>>>,
        pub finished: Arc<AtomicBool>,
    }

    impl RecordSink for MemorySink {
        fn begin(&mut self, columns: &[Tag]) -> io::Result<()> {
            *self.header.lock().unwrap() = Some(header_line(columns));
            Ok(())
        }

        fn append(&mut self, record: &SampleRecord) -> io::Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finish(&mut self) -> io::Result<()> {
            self.finished.store(true, std::sync::atomic::Ordering::Release);
            Ok(())
        }
    }
}
