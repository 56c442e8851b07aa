//! Domain models - core types for geofence classification
//!
//! This module contains the canonical data types used throughout the system:
//! - `GeoPoint`, `GeofenceSpec` - coordinates and the circular fence
//! - `Observation` - one timestamped location ping for a device
//! - `Category`, `CategorySet` - movement categories
//! - `ClassificationReport` - per-device results of a run
//! - `error` - load and classification error types

pub mod classification;
pub mod error;
pub mod types;

// Re-export commonly used types at module level
pub use classification::{
    ClassificationReport, DeviceClassification, DeviceObservations, SkippedDevice,
};
pub use error::{ClassifyError, GeofenceError, LoadError};
pub use types::{Category, CategorySet, DeviceId, GeoPoint, GeofenceSpec, Observation, Timestamp};
