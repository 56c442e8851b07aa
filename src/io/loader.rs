//! CSV loader - normalizes raw ping rows into per-device observation sequences
//!
//! Locations come either from separate latitude/longitude columns or from a
//! combined "lat,lon" column. Rows are grouped by device and each group is
//! stable-sorted by timestamp; rows without a usable timestamp sort first and
//! are rejected later by the classifier.

use crate::domain::{DeviceId, DeviceObservations, GeoPoint, LoadError, Observation, Timestamp};
use crate::infra::config::{Columns, MalformedPolicy};
use crate::infra::metrics::RunStats;
use csv::StringRecord;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// Where the coordinates live in each record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationColumns {
    Split { latitude: usize, longitude: usize },
    Combined(usize),
}

/// Resolved column indices for one input file
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    id: usize,
    timestamp: usize,
    location: LocationColumns,
}

/// Find a header by name, ignoring surrounding whitespace
pub(crate) fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_column(headers: &StringRecord, name: &str) -> Result<usize, LoadError> {
    find_column(headers, name).ok_or_else(|| LoadError::MissingColumn { column: name.to_string() })
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, columns: &Columns) -> Result<Self, LoadError> {
        let id = require_column(headers, &columns.id)?;
        let timestamp = require_column(headers, &columns.timestamp)?;

        let location = match (
            find_column(headers, &columns.latitude),
            find_column(headers, &columns.longitude),
        ) {
            (Some(latitude), Some(longitude)) => LocationColumns::Split { latitude, longitude },
            _ => LocationColumns::Combined(require_column(headers, &columns.location)?),
        };

        Ok(Self { id, timestamp, location })
    }
}

/// Parse a single coordinate value
fn parse_degrees(raw: &str) -> Result<f64, String> {
    raw.trim().parse::<f64>().map_err(|e| format!("{e}"))
}

/// Parse separate latitude and longitude cells into a validated point
pub fn parse_coordinates(latitude: &str, longitude: &str) -> Result<GeoPoint, String> {
    let lat = parse_degrees(latitude)?;
    let lon = parse_degrees(longitude)?;
    GeoPoint::checked(lat, lon).map_err(|e| e.to_string())
}

/// Parse a combined "lat,lon" cell into a validated point
pub fn parse_location(raw: &str) -> Result<GeoPoint, String> {
    let mut parts = raw.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lat), Some(lon), None) => parse_coordinates(lat, lon),
        _ => Err("expected \"latitude,longitude\"".to_string()),
    }
}

/// Loads ping CSV files into `DeviceObservations`
pub struct Loader {
    columns: Columns,
    policy: MalformedPolicy,
}

impl Loader {
    pub fn new(columns: Columns, policy: MalformedPolicy) -> Self {
        Self { columns, policy }
    }

    /// Load observations from a CSV file
    pub fn load_file<P: AsRef<Path>>(
        &self,
        path: P,
        stats: &RunStats,
    ) -> Result<DeviceObservations, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading_observations");
        let file = File::open(path)?;
        self.load_from_reader(file, stats)
    }

    /// Load observations from any CSV source with a header row
    pub fn load_from_reader<R: Read>(
        &self,
        reader: R,
        stats: &RunStats,
    ) -> Result<DeviceObservations, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let index = ColumnIndex::resolve(&headers, &self.columns)?;
        debug!(index = ?index, "columns_resolved");

        let mut groups: FxHashMap<DeviceId, Vec<Observation>> = FxHashMap::default();
        let mut rows = 0u64;

        for (i, record) in csv_reader.records().enumerate() {
            let row = i as u64 + 1;
            rows += 1;
            stats.record_row();

            let parsed = match record {
                Ok(record) => self.parse_record(&record, &index, row),
                // Undecodable bytes spoil one record, not the file
                Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => Err(LoadError::Csv(e)),
                Err(e) => return Err(e.into()),
            };

            match parsed {
                Ok(obs) => {
                    if obs.timestamp.is_none() {
                        debug!(row = %row, device = %obs.device_id, "timestamp_unparseable");
                        stats.record_missing_timestamp();
                    }
                    groups.entry(obs.device_id.clone()).or_default().push(obs);
                }
                Err(e) => match self.policy {
                    MalformedPolicy::Abort => return Err(e),
                    MalformedPolicy::Skip => {
                        warn!(error = %e, "record_skipped");
                        stats.record_malformed_row();
                    }
                },
            }
        }

        let mut devices = DeviceObservations::new();
        for (id, mut observations) in groups {
            // Stable: equal timestamps keep source order
            observations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            devices.insert(id, observations);
        }

        stats.record_devices_loaded(devices.len());
        info!(rows = %rows, devices = %devices.len(), "observations_loaded");

        Ok(devices)
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        index: &ColumnIndex,
        row: u64,
    ) -> Result<Observation, LoadError> {
        let cell = |i: usize| record.get(i).unwrap_or("");

        let id = cell(index.id).trim();
        if id.is_empty() {
            return Err(LoadError::MissingValue { row, column: self.columns.id.clone() });
        }

        let point = match index.location {
            LocationColumns::Split { latitude, longitude } => {
                parse_coordinates(cell(latitude), cell(longitude)).map_err(|reason| {
                    LoadError::MalformedCoordinate {
                        row,
                        value: format!("{},{}", cell(latitude), cell(longitude)),
                        reason,
                    }
                })?
            }
            LocationColumns::Combined(location) => parse_location(cell(location)).map_err(
                |reason| LoadError::MalformedCoordinate {
                    row,
                    value: cell(location).to_string(),
                    reason,
                },
            )?,
        };

        let raw_timestamp = cell(index.timestamp);
        let timestamp = match self.columns.timestamp_format.as_deref() {
            Some(format) => Timestamp::parse_with_format(raw_timestamp, format),
            None => Timestamp::parse(raw_timestamp),
        };

        Ok(Observation::new(DeviceId::from(id), timestamp, point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(policy: MalformedPolicy) -> Loader {
        Loader::new(Columns::default(), policy)
    }

    #[test]
    fn test_parse_location() {
        let p = parse_location("32.8678, 74.2564").unwrap();
        assert_eq!(p, GeoPoint::new(32.8678, 74.2564));
        assert!(parse_location("32.8678").is_err());
        assert!(parse_location("a,b").is_err());
        assert!(parse_location("1,2,3").is_err());
        assert!(parse_location("95.0,10.0").is_err());
    }

    #[test]
    fn test_load_combined_location_groups_and_sorts() {
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION
10.0.0.2,2024-05-01 10:05:00,\"32.8678,74.2564\"
10.0.0.1,2024-05-01 10:10:00,\"32.9,74.3\"
10.0.0.1,2024-05-01 10:00:00,\"32.8678,74.2564\"
";
        let stats = RunStats::new();
        let devices = loader(MalformedPolicy::Skip).load_from_reader(data.as_bytes(), &stats).unwrap();

        assert_eq!(devices.len(), 2);
        let first = &devices[&DeviceId::from("10.0.0.1")];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].point, GeoPoint::new(32.8678, 74.2564));
        assert!(first[0].timestamp < first[1].timestamp);
        assert_eq!(stats.summary().rows_read, 3);
        assert_eq!(stats.summary().devices_loaded, 2);
    }

    #[test]
    fn test_load_prefers_split_columns() {
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION,latitude,longitude
10.0.0.1,2024-05-01 10:00:00,garbage,1.5,2.5
";
        let devices = loader(MalformedPolicy::Abort)
            .load_from_reader(data.as_bytes(), &RunStats::new())
            .unwrap();
        assert_eq!(devices[&DeviceId::from("10.0.0.1")][0].point, GeoPoint::new(1.5, 2.5));
    }

    #[test]
    fn test_missing_id_column() {
        let data = "DEVICE,REQ. TIME,LOCATION\n1,2024-05-01 10:00:00,\"1,2\"\n";
        let err = loader(MalformedPolicy::Skip)
            .load_from_reader(data.as_bytes(), &RunStats::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { ref column } if column == "IP ADDRESS"));
    }

    #[test]
    fn test_missing_location_column() {
        let data = "IP ADDRESS,REQ. TIME,latitude\n1,2024-05-01 10:00:00,1.0\n";
        let err = loader(MalformedPolicy::Skip)
            .load_from_reader(data.as_bytes(), &RunStats::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { ref column } if column == "LOCATION"));
    }

    #[test]
    fn test_malformed_skip_policy() {
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION
10.0.0.1,2024-05-01 10:00:00,not-a-location
10.0.0.1,2024-05-01 10:01:00,\"1.0,2.0\"
,2024-05-01 10:02:00,\"1.0,2.0\"
";
        let stats = RunStats::new();
        let devices = loader(MalformedPolicy::Skip).load_from_reader(data.as_bytes(), &stats).unwrap();
        assert_eq!(devices[&DeviceId::from("10.0.0.1")].len(), 1);
        assert_eq!(stats.rows_malformed(), 2);
    }

    #[test]
    fn test_malformed_abort_policy() {
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION
10.0.0.1,2024-05-01 10:01:00,\"1.0,2.0\"
10.0.0.1,2024-05-01 10:00:00,not-a-location
";
        let err = loader(MalformedPolicy::Abort)
            .load_from_reader(data.as_bytes(), &RunStats::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedCoordinate { row: 2, .. }));
    }

    #[test]
    fn test_unparseable_timestamp_kept_and_sorted_first() {
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION
10.0.0.1,2024-05-01 10:00:00,\"1.0,2.0\"
10.0.0.1,sometime,\"1.0,2.0\"
";
        let stats = RunStats::new();
        let devices = loader(MalformedPolicy::Skip).load_from_reader(data.as_bytes(), &stats).unwrap();
        let obs = &devices[&DeviceId::from("10.0.0.1")];
        assert_eq!(obs.len(), 2);
        assert!(obs[0].timestamp.is_none());
        assert_eq!(stats.summary().rows_missing_timestamp, 1);
    }

    #[test]
    fn test_slash_dates_read_month_first() {
        // 03/04 is March 4th, before 04/03; 05/13 only reads month-first
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION
1.1.1.1,04/03/2024 10:00:00,\"32.8678,74.2564\"
1.1.1.1,03/04/2024 10:00:00,\"33.5,74.2564\"
2.2.2.2,05/13/2024 10:00:00,\"32.8678,74.2564\"
2.2.2.2,05/12/2024 10:00:00,\"33.5,74.2564\"
3.3.3.3,5/1/2024 1:00 PM,\"32.8678,74.2564\"
3.3.3.3,5/1/2024 11:00 AM,\"33.5,74.2564\"
";
        let stats = RunStats::new();
        let devices = loader(MalformedPolicy::Abort).load_from_reader(data.as_bytes(), &stats).unwrap();

        for id in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
            let obs = &devices[&DeviceId::from(id)];
            assert!(obs.iter().all(|o| o.timestamp.is_some()), "{id}");
            assert_eq!(obs[0].point, GeoPoint::new(33.5, 74.2564), "{id}");
            assert_eq!(obs[1].point, GeoPoint::new(32.8678, 74.2564), "{id}");
        }
        assert_eq!(stats.summary().rows_missing_timestamp, 0);
    }

    #[test]
    fn test_explicit_timestamp_format_reads_day_first() {
        let columns = Columns {
            timestamp_format: Some("%d/%m/%Y %H:%M".to_string()),
            ..Columns::default()
        };
        let data = "\
IP ADDRESS,REQ. TIME,LOCATION
1.1.1.1,04/03/2024 10:00,\"32.8678,74.2564\"
1.1.1.1,03/04/2024 10:00,\"33.5,74.2564\"
";
        let devices = Loader::new(columns, MalformedPolicy::Abort)
            .load_from_reader(data.as_bytes(), &RunStats::new())
            .unwrap();
        let obs = &devices[&DeviceId::from("1.1.1.1")];
        // 4 March before 3 April
        assert_eq!(obs[0].point, GeoPoint::new(32.8678, 74.2564));
        assert_eq!(obs[1].point, GeoPoint::new(33.5, 74.2564));
    }

    fn with_invalid_utf8_row() -> Vec<u8> {
        let mut data = b"IP ADDRESS,REQ. TIME,LOCATION\n".to_vec();
        data.extend_from_slice(b"10.0.0.1,2024-05-01 10:00:00,\"1.0,2.0\"\n");
        data.extend_from_slice(b"10.0.0.\xff,2024-05-01 10:01:00,\"1.0,2.0\"\n");
        data.extend_from_slice(b"10.0.0.1,2024-05-01 10:02:00,\"1.0,2.0\"\n");
        data
    }

    #[test]
    fn test_invalid_utf8_row_skipped() {
        let stats = RunStats::new();
        let devices = loader(MalformedPolicy::Skip)
            .load_from_reader(with_invalid_utf8_row().as_slice(), &stats)
            .unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[&DeviceId::from("10.0.0.1")].len(), 2);
        assert_eq!(stats.summary().rows_read, 3);
        assert_eq!(stats.rows_malformed(), 1);
    }

    #[test]
    fn test_invalid_utf8_row_aborts_under_abort_policy() {
        let err = loader(MalformedPolicy::Abort)
            .load_from_reader(with_invalid_utf8_row().as_slice(), &RunStats::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::Csv(_)));
    }
}
