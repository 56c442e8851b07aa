//! Lock-free run counters and end-of-run summary
//!
//! Counters are shared between the loader and the classification workers.
//! All atomics use Relaxed ordering: these are statistics only and must not
//! be used to coordinate work.

use crate::domain::{Category, DeviceClassification};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for one classification run
pub struct RunStats {
    started_at: Instant,
    rows_read: AtomicU64,
    rows_malformed: AtomicU64,
    rows_missing_timestamp: AtomicU64,
    devices_loaded: AtomicU64,
    devices_classified: AtomicU64,
    devices_skipped: AtomicU64,
    inbound: AtomicU64,
    outbound: AtomicU64,
    stayed_in: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            rows_read: AtomicU64::new(0),
            rows_malformed: AtomicU64::new(0),
            rows_missing_timestamp: AtomicU64::new(0),
            devices_loaded: AtomicU64::new(0),
            devices_classified: AtomicU64::new(0),
            devices_skipped: AtomicU64::new(0),
            inbound: AtomicU64::new(0),
            outbound: AtomicU64::new(0),
            stayed_in: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_row(&self) {
        self.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_malformed_row(&self) {
        self.rows_malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_missing_timestamp(&self) {
        self.rows_missing_timestamp.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_devices_loaded(&self, count: usize) {
        self.devices_loaded.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Count a classified device and each of its categories
    pub fn record_classified(&self, classification: &DeviceClassification) {
        self.devices_classified.fetch_add(1, Ordering::Relaxed);
        for category in classification.categories.iter() {
            let counter = match category {
                Category::Inbound => &self.inbound,
                Category::Outbound => &self.outbound,
                Category::StayedIn => &self.stayed_in,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_skipped(&self) {
        self.devices_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn devices_classified(&self) -> u64 {
        self.devices_classified.load(Ordering::Relaxed)
    }

    pub fn devices_skipped(&self) -> u64 {
        self.devices_skipped.load(Ordering::Relaxed)
    }

    pub fn rows_malformed(&self) -> u64 {
        self.rows_malformed.load(Ordering::Relaxed)
    }

    /// Snapshot all counters
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            rows_read: self.rows_read.load(Ordering::Relaxed),
            rows_malformed: self.rows_malformed.load(Ordering::Relaxed),
            rows_missing_timestamp: self.rows_missing_timestamp.load(Ordering::Relaxed),
            devices_loaded: self.devices_loaded.load(Ordering::Relaxed),
            devices_classified: self.devices_classified.load(Ordering::Relaxed),
            devices_skipped: self.devices_skipped.load(Ordering::Relaxed),
            inbound: self.inbound.load(Ordering::Relaxed),
            outbound: self.outbound.load(Ordering::Relaxed),
            stayed_in: self.stayed_in.load(Ordering::Relaxed),
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows_read: u64,
    pub rows_malformed: u64,
    pub rows_missing_timestamp: u64,
    pub devices_loaded: u64,
    pub devices_classified: u64,
    pub devices_skipped: u64,
    pub inbound: u64,
    pub outbound: u64,
    pub stayed_in: u64,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            rows_read = %self.rows_read,
            rows_malformed = %self.rows_malformed,
            rows_missing_timestamp = %self.rows_missing_timestamp,
            devices_loaded = %self.devices_loaded,
            devices_classified = %self.devices_classified,
            devices_skipped = %self.devices_skipped,
            inbound = %self.inbound,
            outbound = %self.outbound,
            stayed_in = %self.stayed_in,
            elapsed_ms = %self.elapsed_ms,
            "run_summary"
        );
    }
}
