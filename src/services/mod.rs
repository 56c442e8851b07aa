//! Services - classification logic
//!
//! - `geo` - Haversine distance and geofence membership
//! - `classifier` - Per-device transition classification and whole-run drivers

pub mod classifier;
pub mod geo;

// Re-export commonly used types
pub use classifier::{classify_all, classify_concurrent, classify_device, TransitionTracker};
pub use geo::{distance, is_inside, EARTH_RADIUS_M};
