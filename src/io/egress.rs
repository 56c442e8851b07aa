//! Classification egress - writes per-device results to file
//!
//! Results are written in JSONL format (one JSON object per device). Every
//! record carries the run id so files from several runs can be told apart.

use crate::domain::{CategorySet, ClassificationReport, DeviceClassification, DeviceId, GeoPoint};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) run id
pub fn new_run_id() -> String {
    Uuid::now_v7().to_string()
}

/// One JSONL line
#[derive(Debug, Serialize)]
struct ClassificationRecord<'a> {
    run_id: &'a str,
    device: &'a DeviceId,
    categories: &'a CategorySet,
    first_point: &'a GeoPoint,
    observations: usize,
}

impl<'a> ClassificationRecord<'a> {
    fn new(run_id: &'a str, d: &'a DeviceClassification) -> Self {
        Self {
            run_id,
            device: &d.device_id,
            categories: &d.categories,
            first_point: &d.first_point,
            observations: d.observations,
        }
    }
}

/// Egress writer for classifications
pub struct Egress {
    file_path: PathBuf,
    run_id: String,
}

impl Egress {
    pub fn new<P: AsRef<Path>>(file_path: P, run_id: &str) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), run_id = %run_id, "egress_initialized");
        Self { file_path, run_id: run_id.to_string() }
    }

    /// Write every classified device, replacing any previous file.
    /// Returns the number of lines written.
    pub fn write_report(&self, report: &ClassificationReport) -> std::io::Result<usize> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = BufWriter::new(File::create(&self.file_path)?);
        let mut count = 0;
        for classification in report.devices.values() {
            self.write_classification(&mut writer, classification)?;
            count += 1;
        }
        writer.flush()?;

        info!(
            file = %self.file_path.display(),
            devices = %count,
            skipped = %report.skipped.len(),
            "classifications_egressed"
        );
        Ok(count)
    }

    fn write_classification<W: Write>(
        &self,
        writer: &mut W,
        classification: &DeviceClassification,
    ) -> std::io::Result<()> {
        let record = ClassificationRecord::new(&self.run_id, classification);
        let line = serde_json::to_string(&record)?;
        writeln!(writer, "{}", line)?;
        debug!(device = %classification.device_id, bytes = %line.len(), "egress_written");
        Ok(())
    }
}
