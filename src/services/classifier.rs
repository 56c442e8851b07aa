//! Geofence transition classification
//!
//! Each device's observations are walked in timestamp order. Consecutive
//! readings are compared pairwise:
//! - outside -> inside marks the device Inbound
//! - inside -> outside marks the device Outbound
//! - every reading inside marks the device StayedIn
//!
//! Devices are independent, so a run can be split across worker tasks and
//! merged afterwards. Within a device the walk is strictly sequential.

use crate::domain::{
    Category, CategorySet, ClassificationReport, ClassifyError, DeviceClassification, DeviceId,
    DeviceObservations, GeofenceSpec, Observation, SkippedDevice,
};
use crate::infra::metrics::RunStats;
use crate::services::geo::is_inside;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Rolling inside/outside state for one device
#[derive(Debug, Default)]
pub struct TransitionTracker {
    previous_inside: Option<bool>,
    saw_inside: bool,
    saw_outside: bool,
    transitioned_in: bool,
    transitioned_out: bool,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the membership of the next reading
    pub fn observe(&mut self, inside: bool) {
        if inside {
            self.saw_inside = true;
        } else {
            self.saw_outside = true;
        }

        match (self.previous_inside, inside) {
            (Some(false), true) => self.transitioned_in = true,
            (Some(true), false) => self.transitioned_out = true,
            _ => {}
        }

        self.previous_inside = Some(inside);
    }

    pub fn categories(&self) -> CategorySet {
        let mut set = CategorySet::EMPTY;
        if self.transitioned_in {
            set.insert(Category::Inbound);
        }
        if self.transitioned_out {
            set.insert(Category::Outbound);
        }
        if self.saw_inside && !self.saw_outside {
            set.insert(Category::StayedIn);
        }
        set
    }
}

/// Check that a multi-reading sequence has a total timestamp order
fn validate_order(
    device_id: &DeviceId,
    observations: &[Observation],
) -> Result<(), ClassifyError> {
    if observations.len() < 2 {
        return Ok(());
    }

    let mut previous = None;
    for (i, obs) in observations.iter().enumerate() {
        let Some(ts) = obs.timestamp else {
            return Err(ClassifyError::InvalidInput {
                device: device_id.clone(),
                reason: format!("missing timestamp at position {i}"),
            });
        };
        if let Some(prev) = previous {
            if ts < prev {
                return Err(ClassifyError::InvalidInput {
                    device: device_id.clone(),
                    reason: format!("timestamp {ts} at position {i} precedes {prev}"),
                });
            }
        }
        previous = Some(ts);
    }
    Ok(())
}

/// Classify one device from its time-ordered observations
///
/// The sequence is validated but never re-sorted.
pub fn classify_device(
    device_id: &DeviceId,
    observations: &[Observation],
    fence: &GeofenceSpec,
) -> Result<DeviceClassification, ClassifyError> {
    let Some(first) = observations.first() else {
        return Err(ClassifyError::EmptySequence(device_id.clone()));
    };
    validate_order(device_id, observations)?;

    let mut tracker = TransitionTracker::new();
    for obs in observations {
        tracker.observe(is_inside(obs.point, fence));
    }

    Ok(DeviceClassification {
        device_id: device_id.clone(),
        categories: tracker.categories(),
        first_point: first.point,
        observations: observations.len(),
    })
}

/// Classify a batch of devices, isolating per-device failures
fn classify_batch<'a, I>(
    devices: I,
    fence: &GeofenceSpec,
    stats: &RunStats,
) -> ClassificationReport
where
    I: IntoIterator<Item = (&'a DeviceId, &'a Vec<Observation>)>,
{
    let mut report = ClassificationReport::new();

    for (device_id, observations) in devices {
        if observations.is_empty() {
            debug!(device = %device_id, "device_without_observations_skipped");
            continue;
        }

        match classify_device(device_id, observations, fence) {
            Ok(classification) => {
                debug!(
                    device = %device_id,
                    observations = %classification.observations,
                    categories = %classification.categories,
                    "device_classified"
                );
                stats.record_classified(&classification);
                report.devices.insert(device_id.clone(), classification);
            }
            Err(e) => {
                warn!(device = %device_id, error = %e, "device_skipped");
                stats.record_skipped();
                report.skipped.push(SkippedDevice { device_id: device_id.clone(), error: e });
            }
        }
    }

    report
}

/// Classify every device sequentially
pub fn classify_all(
    devices: &DeviceObservations,
    fence: &GeofenceSpec,
    stats: &RunStats,
) -> ClassificationReport {
    classify_batch(devices.iter(), fence, stats)
}

/// Classify every device on up to `workers` blocking tasks
///
/// Produces the same report as `classify_all`.
pub async fn classify_concurrent(
    devices: DeviceObservations,
    fence: GeofenceSpec,
    workers: usize,
    stats: Arc<RunStats>,
) -> anyhow::Result<ClassificationReport> {
    let workers = workers.max(1);
    let chunk_size = devices.len().div_ceil(workers).max(1);

    let mut chunks: Vec<Vec<(DeviceId, Vec<Observation>)>> = Vec::with_capacity(workers);
    let mut current = Vec::with_capacity(chunk_size);
    for entry in devices {
        current.push(entry);
        if current.len() == chunk_size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(chunk_size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    info!(
        workers = %workers,
        chunks = %chunks.len(),
        chunk_size = %chunk_size,
        "classification_started"
    );

    let mut tasks = JoinSet::new();
    for chunk in chunks {
        let stats = Arc::clone(&stats);
        tasks.spawn_blocking(move || {
            classify_batch(chunk.iter().map(|(id, obs)| (id, obs)), &fence, &stats)
        });
    }

    let mut report = ClassificationReport::new();
    while let Some(result) = tasks.join_next().await {
        report.merge(result?);
    }

    info!(
        devices = %report.devices.len(),
        skipped = %report.skipped.len(),
        "classification_finished"
    );

    Ok(report)
}
