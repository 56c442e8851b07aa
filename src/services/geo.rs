//! Great-circle distance and geofence membership
//!
//! Distances use the haversine formula on a sphere of radius 6,371 km.

use crate::domain::{GeoPoint, GeofenceSpec};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters
///
/// Always finite and non-negative for valid points; 0 for identical points
/// and at most `π * EARTH_RADIUS_M` for antipodes.
pub fn distance(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` just outside [0, 1] near antipodes
    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Whether a point lies within the fence. The boundary counts as inside.
#[inline]
pub fn is_inside(point: GeoPoint, fence: &GeofenceSpec) -> bool {
    distance(point, fence.center()) <= fence.radius_meters()
}
