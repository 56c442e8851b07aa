//! IO modules - loading source data and writing results
//!
//! This module contains all file IO:
//! - `loader` - CSV pings into per-device observation sequences
//! - `splitter` - Split a combined location column into latitude/longitude
//! - `table` - Category table (CSV) with padded columns
//! - `egress` - Per-device classifications (JSONL format)
//! - `map` - HTML map of the fence and classified devices

pub mod egress;
pub mod loader;
pub mod map;
pub mod splitter;
pub mod table;

// Re-export commonly used types
pub use egress::{new_run_id, Egress};
pub use loader::{parse_location, Loader};
pub use map::MapRenderer;
pub use splitter::{split_file, split_location_columns};
pub use table::CategoryTable;
