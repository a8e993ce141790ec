//! Audit trail for safety-relevant controller events.
//!
//! One JSON object per line, appended to the configured file. Entries carry
//! both the controller's monotonic time and wall-clock time.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SystemStart,
    SystemShutdown,
    DeviceConnected,
    DeviceDisconnected,
    /// Device failure taken to the safe state
    DeviceFault,
    HeaterEnabled,
    HeaterDisabled,
    PumpChange,
    ModeChange,
    /// Setpoint, duty cycle, weight or staged-input commit accepted
    ConfigChange,
    /// Command argument rejected by range validation
    ConfigRejected,
    /// A heater task outlived its termination timeout
    TerminationTimeout,
    LoggingStarted,
    LoggingStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Microseconds since controller start
    pub timestamp_us: u64,
    pub unix_us: u64,
    pub event_type: AuditEventType,
    pub details: serde_json::Value,
}

/// Thread-safe JSONL writer.
pub struct AuditLogger {
    writer: Mutex<BufWriter<File>>,
}

impl AuditLogger {
    /// Opens `path` in append mode, creating parent directories.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }

    pub fn log(&self, entry: AuditEntry) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        serde_json::to_writer(&mut *writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    pub fn log_event(
        &self,
        timestamp_us: u64,
        unix_us: u64,
        event_type: AuditEventType,
        details: serde_json::Value,
    ) -> std::io::Result<()> {
        self.log(AuditEntry {
            timestamp_us,
            unix_us,
            event_type,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_audit_logger_appends_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit").join("brau.jsonl");

        let logger = AuditLogger::new(&path).unwrap();
        logger
            .log_event(
                1000,
                1704067200000000,
                AuditEventType::SystemStart,
                serde_json::json!({"version": "0.1.0"}),
            )
            .unwrap();
        drop(logger);

        // Reopening must not truncate.
        let logger = AuditLogger::new(&path).unwrap();
        logger
            .log_event(
                2000,
                1704067201000000,
                AuditEventType::ConfigRejected,
                serde_json::json!({"command": "set_setpoint", "value": 250.0}),
            )
            .unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();

        let lines: Vec<&str> = content.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.timestamp_us, 1000);
        assert_eq!(first.event_type, AuditEventType::SystemStart);

        let second: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.event_type, AuditEventType::ConfigRejected);
        assert!(lines[1].contains("\"config_rejected\""));
    }
}
