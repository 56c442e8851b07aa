//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> on the command line (parsed by the binary)
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Target coordinates, radius and output directory can be overridden from
//! the command line after loading.

use crate::domain::{GeoPoint, GeofenceError, GeofenceSpec};
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// What to do with a record whose coordinates cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log a warning, count the record and continue
    Skip,
    /// Fail the run
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_meters")]
    pub radius_meters: f64,
}

const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

fn config_path_or_default(from_env: Option<String>) -> String {
    from_env
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

fn default_radius_meters() -> f64 {
    500.0
}

/// Source column names
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Columns {
    #[serde(default = "default_id_column")]
    pub id: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    /// Explicit chrono layout for the timestamp column (e.g. "%d/%m/%Y %H:%M").
    /// Unset means common layouts are tried, month-first for numeric dates.
    #[serde(default)]
    pub timestamp_format: Option<String>,
    /// Combined "lat,lon" column
    #[serde(default = "default_location_column")]
    pub location: String,
    #[serde(default = "default_latitude_column")]
    pub latitude: String,
    #[serde(default = "default_longitude_column")]
    pub longitude: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            id: default_id_column(),
            timestamp: default_timestamp_column(),
            timestamp_format: None,
            location: default_location_column(),
            latitude: default_latitude_column(),
            longitude: default_longitude_column(),
        }
    }
}

fn default_id_column() -> String {
    "IP ADDRESS".to_string()
}

fn default_timestamp_column() -> String {
    "REQ. TIME".to_string()
}

fn default_location_column() -> String {
    "LOCATION".to_string()
}

fn default_latitude_column() -> String {
    "latitude".to_string()
}

fn default_longitude_column() -> String {
    "longitude".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_input_file")]
    pub file: String,
    #[serde(default = "default_malformed_policy")]
    pub malformed: MalformedPolicy,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { file: default_input_file(), malformed: default_malformed_policy() }
    }
}

fn default_input_file() -> String {
    "pings.csv".to_string()
}

fn default_malformed_policy() -> MalformedPolicy {
    MalformedPolicy::Skip
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    /// Category table (CSV)
    #[serde(default = "default_table_file")]
    pub table_file: String,
    /// Per-device classifications (JSONL)
    #[serde(default = "default_classifications_file")]
    pub classifications_file: String,
    /// Map page (HTML)
    #[serde(default = "default_map_file")]
    pub map_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            table_file: default_table_file(),
            classifications_file: default_classifications_file(),
            map_file: default_map_file(),
        }
    }
}

fn default_output_dir() -> String {
    "out".to_string()
}

fn default_table_file() -> String {
    "ip_categorization.csv".to_string()
}

fn default_classifications_file() -> String {
    "classifications.jsonl".to_string()
}

fn default_map_file() -> String {
    "geofence_map.html".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClassifierConfig {
    /// Worker tasks for concurrent classification (0 = available parallelism)
    #[serde(default)]
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub columns: Columns,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    target_latitude: f64,
    target_longitude: f64,
    radius_meters: f64,
    columns: Columns,
    input_file: String,
    malformed_policy: MalformedPolicy,
    output_dir: String,
    table_file: String,
    classifications_file: String,
    map_file: String,
    workers: usize,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_latitude: 32.86783735156178,
            target_longitude: 74.25641198819648,
            radius_meters: default_radius_meters(),
            columns: Columns::default(),
            input_file: default_input_file(),
            malformed_policy: default_malformed_policy(),
            output_dir: default_output_dir(),
            table_file: default_table_file(),
            classifications_file: default_classifications_file(),
            map_file: default_map_file(),
            workers: 0,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Config path from the CONFIG_FILE environment variable, else the default
    pub fn resolve_config_path() -> String {
        config_path_or_default(env::var("CONFIG_FILE").ok())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            target_latitude: toml_config.target.latitude,
            target_longitude: toml_config.target.longitude,
            radius_meters: toml_config.target.radius_meters,
            columns: toml_config.columns,
            input_file: toml_config.input.file,
            malformed_policy: toml_config.input.malformed,
            output_dir: toml_config.output.dir,
            table_file: toml_config.output.table_file,
            classifications_file: toml_config.output.classifications_file,
            map_file: toml_config.output.map_file,
            workers: toml_config.classifier.workers,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Build the validated geofence for this run
    pub fn geofence(&self) -> Result<GeofenceSpec, GeofenceError> {
        let center = GeoPoint::new(self.target_latitude, self.target_longitude);
        GeofenceSpec::new(center, self.radius_meters)
    }

    /// Worker count with 0 resolved to the machine's available parallelism
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        Path::new(&self.output_dir).join(file)
    }

    // Command line overrides

    pub fn with_target(mut self, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        if let Some(lat) = latitude {
            self.target_latitude = lat;
        }
        if let Some(lon) = longitude {
            self.target_longitude = lon;
        }
        self
    }

    pub fn with_radius_meters(mut self, radius: f64) -> Self {
        self.radius_meters = radius;
        self
    }

    pub fn with_input_file(mut self, file: &str) -> Self {
        self.input_file = file.to_string();
        self
    }

    pub fn with_output_dir(mut self, dir: &str) -> Self {
        self.output_dir = dir.to_string();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    // Getters for all config fields
    pub fn target_latitude(&self) -> f64 {
        self.target_latitude
    }

    pub fn target_longitude(&self) -> f64 {
        self.target_longitude
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn input_file(&self) -> &str {
        &self.input_file
    }

    pub fn malformed_policy(&self) -> MalformedPolicy {
        self.malformed_policy
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn table_file(&self) -> &str {
        &self.table_file
    }

    pub fn classifications_file(&self) -> &str {
        &self.classifications_file
    }

    pub fn map_file(&self) -> &str {
        &self.map_file
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target_latitude(), 32.86783735156178);
        assert_eq!(config.target_longitude(), 74.25641198819648);
        assert_eq!(config.radius_meters(), 500.0);
        assert_eq!(config.columns().id, "IP ADDRESS");
        assert_eq!(config.columns().timestamp, "REQ. TIME");
        assert_eq!(config.columns().location, "LOCATION");
        assert_eq!(config.malformed_policy(), MalformedPolicy::Skip);
        assert_eq!(config.output_dir(), "out");
    }

    #[test]
    fn test_default_geofence_valid() {
        let fence = Config::default().geofence().unwrap();
        assert_eq!(fence.radius_meters(), 500.0);
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_target(Some(10.0), None)
            .with_radius_meters(250.0)
            .with_output_dir("reports")
            .with_workers(3);
        assert_eq!(config.target_latitude(), 10.0);
        assert_eq!(config.target_longitude(), 74.25641198819648);
        assert_eq!(config.radius_meters(), 250.0);
        assert_eq!(config.effective_workers(), 3);
        assert_eq!(config.output_path("a.csv"), Path::new("reports").join("a.csv"));
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let config = Config::default().with_radius_meters(0.0);
        assert!(matches!(config.geofence(), Err(GeofenceError::InvalidRadius(_))));
    }

    #[test]
    fn test_effective_workers_auto() {
        assert!(Config::default().effective_workers() >= 1);
    }

    #[test]
    fn test_config_path_from_env_or_default() {
        assert_eq!(config_path_or_default(Some("config/site.toml".to_string())), "config/site.toml");
        assert_eq!(config_path_or_default(None), "config/dev.toml");
        assert_eq!(config_path_or_default(Some("  ".to_string())), "config/dev.toml");
    }

    #[test]
    fn test_timestamp_format_column_setting() {
        let toml_str = r#"
[target]
latitude = 1.0
longitude = 2.0

[columns]
timestamp_format = "%d/%m/%Y %H:%M"
"#;
        let parsed: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.columns.timestamp_format.as_deref(), Some("%d/%m/%Y %H:%M"));
        assert_eq!(Columns::default().timestamp_format, None);
    }
}
