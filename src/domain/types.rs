//! Shared types for geofence classification

use crate::domain::error::GeofenceError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Newtype wrapper for device identifiers (IP address text as found in the source)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build a point, rejecting non-finite or out-of-range coordinates
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self, GeofenceError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeofenceError::InvalidCoordinate(format!("latitude {latitude}")));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeofenceError::InvalidCoordinate(format!("longitude {longitude}")));
        }
        Ok(Self { latitude, longitude })
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Observation timestamp
///
/// Source data carries timestamps either as text in one of several common
/// layouts or as epoch milliseconds. Values are wall-clock: an explicit UTC
/// offset is dropped rather than applied, so a column mixing offset and
/// offset-free text still compares on one clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub NaiveDateTime);

/// Text layouts accepted by `Timestamp::parse`, tried in order.
///
/// Numeric dates are month-first; the day-first layouts only match when the
/// leading field cannot be a month.
const DATETIME_FORMATS: [&str; 20] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Date-only layouts, read as midnight
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

impl Timestamp {
    /// Parse a timestamp cell. Returns None for empty or unrecognised values.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self(dt.naive_local()));
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Self(dt));
            }
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0).map(Self);
            }
        }

        // Epoch milliseconds
        if let Ok(ms) = s.parse::<i64>() {
            return DateTime::from_timestamp_millis(ms).map(|dt| Self(dt.naive_utc()));
        }

        None
    }

    /// Parse with one explicit chrono layout, e.g. `%d/%m/%Y %H:%M`
    pub fn parse_with_format(raw: &str, format: &str) -> Option<Self> {
        let s = raw.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Self(dt));
        }
        NaiveDate::parse_from_str(s, format).ok()?.and_hms_opt(0, 0, 0).map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// One recorded location ping
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub device_id: DeviceId,
    /// None when the source value was missing or unparseable
    pub timestamp: Option<Timestamp>,
    pub point: GeoPoint,
}

impl Observation {
    pub fn new(device_id: DeviceId, timestamp: Option<Timestamp>, point: GeoPoint) -> Self {
        Self { device_id, timestamp, point }
    }
}

/// Circular geofence around a target coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeofenceSpec {
    center: GeoPoint,
    radius_meters: f64,
}

impl GeofenceSpec {
    pub fn new(center: GeoPoint, radius_meters: f64) -> Result<Self, GeofenceError> {
        let center = GeoPoint::checked(center.latitude, center.longitude)?;
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(GeofenceError::InvalidRadius(radius_meters));
        }
        Ok(Self { center, radius_meters })
    }

    #[inline]
    pub fn center(&self) -> GeoPoint {
        self.center
    }

    #[inline]
    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }
}

/// Movement category assigned to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Inbound,
    Outbound,
    StayedIn,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Inbound, Category::Outbound, Category::StayedIn];

    #[inline]
    fn bit(self) -> u8 {
        match self {
            Category::Inbound => 0b001,
            Category::Outbound => 0b010,
            Category::StayedIn => 0b100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Inbound => "inbound",
            Category::Outbound => "outbound",
            Category::StayedIn => "stayed_in",
        }
    }

    /// Human-readable label used in popups and the legend
    pub fn label(&self) -> &'static str {
        match self {
            Category::Inbound => "Inbound IP",
            Category::Outbound => "Outbound IP",
            Category::StayedIn => "Stayed-in IP",
        }
    }

    /// Marker colour on the rendered map
    pub fn color(&self) -> &'static str {
        match self {
            Category::Inbound => "blue",
            Category::Outbound => "green",
            Category::StayedIn => "orange",
        }
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Set of categories a device belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const EMPTY: CategorySet = CategorySet(0);

    #[inline]
    pub fn insert(&mut self, category: Category) {
        self.0 |= category.bit();
    }

    #[inline]
    pub fn contains(&self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let mut set = CategorySet::EMPTY;
        for c in iter {
            set.insert(c);
        }
        set
    }
}

impl std::fmt::Display for CategorySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for (i, category) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "+")?;
            }
            write!(f, "{}", category.as_str())?;
        }
        Ok(())
    }
}

impl Serialize for CategorySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
