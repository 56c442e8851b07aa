//! Classification results for a single run

use crate::domain::error::ClassifyError;
use crate::domain::types::{Category, CategorySet, DeviceId, GeoPoint, Observation};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-device observation sequences, each sorted ascending by timestamp
pub type DeviceObservations = BTreeMap<DeviceId, Vec<Observation>>;

/// Categories assigned to one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceClassification {
    pub device_id: DeviceId,
    pub categories: CategorySet,
    /// First recorded observation, used as the device's map position
    pub first_point: GeoPoint,
    pub observations: usize,
}

impl DeviceClassification {
    #[inline]
    pub fn is(&self, category: Category) -> bool {
        self.categories.contains(category)
    }
}

/// A device left out of the result because its sequence was unusable
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDevice {
    pub device_id: DeviceId,
    pub error: ClassifyError,
}

/// Outcome of classifying every device in a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationReport {
    pub devices: BTreeMap<DeviceId, DeviceClassification>,
    pub skipped: Vec<SkippedDevice>,
}

impl ClassificationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<&DeviceClassification> {
        self.devices.get(device_id)
    }

    /// Devices in a category, in device id order
    pub fn in_category(
        &self,
        category: Category,
    ) -> impl Iterator<Item = &DeviceClassification> + '_ {
        self.devices.values().filter(move |d| d.is(category))
    }

    /// Device ids in a category, in device id order
    pub fn ids(&self, category: Category) -> Vec<&DeviceId> {
        self.in_category(category).map(|d| &d.device_id).collect()
    }

    pub fn count(&self, category: Category) -> usize {
        self.in_category(category).count()
    }

    /// Fold another report into this one. Device sets are disjoint per run.
    pub fn merge(&mut self, other: ClassificationReport) {
        self.devices.extend(other.devices);
        self.skipped.extend(other.skipped);
        self.skipped.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    }
}
