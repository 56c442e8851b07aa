//! Error taxonomy for loading and classification

use crate::domain::types::DeviceId;

/// Structural problems with the source data. Loading halts on these.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("required column missing from input: {column}")]
    MissingColumn { column: String },

    #[error("row {row} has no value in column {column}")]
    MissingValue { row: u64, column: String },

    #[error("malformed coordinate at row {row}: {value:?} ({reason})")]
    MalformedCoordinate { row: u64, value: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-device classification failures. Isolated to the device.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    #[error("invalid input for device {device}: {reason}")]
    InvalidInput { device: DeviceId, reason: String },

    #[error("device {0} has no observations")]
    EmptySequence(DeviceId),
}

impl ClassifyError {
    pub fn device(&self) -> &DeviceId {
        match self {
            ClassifyError::InvalidInput { device, .. } => device,
            ClassifyError::EmptySequence(device) => device,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeofenceError {
    #[error("radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("coordinate out of range: {0}")]
    InvalidCoordinate(String),
}
