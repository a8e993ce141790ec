//! Plain-text sample log file.
//!
//! Layout: a title line, the creation time, a blank line, the column header,
//! then one space-separated record per line.

use brau_core::logger::{header_line, RecordSink, SampleRecord};
use brau_core::tags::Tag;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const TITLE: &str = "Brau Data Log";

pub struct FileSink {
    path: PathBuf,
    created: DateTime<Local>,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Creates `brau_log_<YYYYmmdd-HHMM>.txt` under `dir`.
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        let created = Local::now();
        let path = dir.join(file_name(&created));
        Self::create(path, created)
    }

    pub fn create(path: PathBuf, created: DateTime<Local>) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            created,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn file_name(created: &DateTime<Local>) -> String {
    format!("brau_log_{}.txt", created.format("%Y%m%d-%H%M"))
}

impl RecordSink for FileSink {
    fn begin(&mut self, columns: &[Tag]) -> io::Result<()> {
        writeln!(self.writer, "{}", TITLE)?;
        writeln!(self.writer, "{}", self.created.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", header_line(columns))?;
        self.writer.flush()
    }

    fn append(&mut self, record: &SampleRecord) -> io::Result<()> {
        writeln!(self.writer, "{}", record.to_line())?;
        self.writer.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brau_core::tags::RECORD_COLUMNS;
    use brau_core::BoilMode;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(elapsed_seconds: f64) -> SampleRecord {
        SampleRecord {
            elapsed_seconds,
            pump: true,
            mash_heater: true,
            boil_heater: false,
            mash_temp: 150.04,
            boil_temp: 120.0,
            heater_temp: 158.31,
            boil_mode: BoilMode::Manual,
            mash_setpoint: 154.0,
            boil_setpoint: 170.0,
            boil_dc_manual: 0.0,
            boil_dc_actual: 0.0,
            mash_dc_actual: 42.5,
            mash_integral: 1.25,
            boil_integral: 0.0,
            optimizer_active: false,
        }
    }

    #[test]
    fn file_name_uses_minute_resolution() {
        let created = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 59).unwrap();
        assert_eq!(file_name(&created), "brau_log_20240309-0705.txt");
    }

    #[test]
    fn file_has_preamble_header_and_records() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::create_in(&dir.path().join("logs")).unwrap();
        let path = sink.path().to_path_buf();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("brau_log_"));

        sink.begin(&RECORD_COLUMNS).unwrap();
        sink.append(&record(1.0)).unwrap();
        sink.append(&record(2.0)).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], TITLE);
        assert!(lines[2].is_empty());
        assert!(lines[3].starts_with("Time(sec) Pump Mash_heater"));
        assert_eq!(
            lines[4],
            "1.0 1 1 0 150.0 120.0 158.3 0 154.0 170.0 0 0.0 42.5 1.250 0.000 0"
        );
        assert!(lines[5].starts_with("2.0 "));
    }
}
