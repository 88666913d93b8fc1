//! JSONL telemetry logger with file rotation

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::qsp::protocol::{RxDeviceState, TxDeviceState};

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// One line of the telemetry log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub rssi: u8,
    pub snr: u8,
    pub rx_voltage: u8,
    pub a1_voltage: u8,
    pub a2_voltage: u8,
    pub failsafe: bool,
    pub roundtrip_us: Option<u32>,
    pub frames_received: u64,
    pub frames_rejected: u64,
}

impl TelemetryRecord {
    /// Snapshot the device states at `at`
    pub fn from_states(tx: &TxDeviceState, rx: &RxDeviceState, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.to_rfc3339(),
            rssi: rx.rssi,
            snr: rx.snr,
            rx_voltage: rx.rx_voltage,
            a1_voltage: rx.a1_voltage,
            a2_voltage: rx.a2_voltage,
            failsafe: rx.is_failsafe(),
            roundtrip_us: tx.roundtrip_us,
            frames_received: tx.frames_received,
            frames_rejected: tx.frames_rejected,
        }
    }
}

/// Writes telemetry records to rotating JSONL files
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    current_file: Option<PathBuf>,
    records_in_file: usize,
    file_seq: u32,
}

impl TelemetryLogger {
    /// Create a logger writing into `dir`, creating it if needed
    ///
    /// No file is opened until the first record is logged.
    pub fn new<P: AsRef<Path>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            current_file: None,
            records_in_file: 0,
            file_seq: 0,
        })
    }

    /// Append one record, rotating first if the current file is full
    pub fn log(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            self.records_in_file += 1;
        }

        Ok(())
    }

    /// File currently being written
    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let name = format!(
            "{}{}_{:04}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.file_seq,
            FILE_EXTENSION
        );
        self.file_seq = self.file_seq.wrapping_add(1);

        let path = self.dir.join(name);
        let file = File::create(&path)?;
        info!("Writing telemetry to {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_file = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Delete the oldest log files beyond `max_files_to_keep`
    fn prune(&self) -> Result<()> {
        let mut files = self.log_files()?;
        files.sort();

        let excess = files.len().saturating_sub(self.max_files_to_keep);
        for old in files.into_iter().take(excess) {
            debug!("Removing old telemetry file {}", old.display());
            fs::remove_file(old)?;
        }

        Ok(())
    }

    fn log_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_log = path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX));

            if is_log {
                files.push(path);
            }
        }

        Ok(files)
    }
}
