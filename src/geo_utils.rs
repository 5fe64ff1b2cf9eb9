//! # Geographic Utilities
//!
//! Distance and extent helpers shared by segmentation, inference and the
//! exporters.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points, in meters |
//! | [`haversine_km`] | Same, in kilometers (the unit of the clustering threshold) |
//! | [`polyline_length`] | Length of a chronologically ordered path |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`compute_center`] | Arithmetic centroid of a set of points |
//!
//! ## Haversine
//!
//! Distances treat the Earth as a sphere with radius 6,371 km. This is the
//! accepted precision trade-off for trip segmentation: errors stay well under
//! 0.5%, far below the tens of kilometers that separate trip segments.
//!
//! ```rust
//! use photo_trip::{GpsPoint, geo_utils};
//!
//! let paris = GpsPoint::new(48.8566, 2.3522);
//! let vienna = GpsPoint::new(48.2082, 16.3738);
//! let km = geo_utils::haversine_km(&paris, &vienna);
//! assert!((km - 1034.0).abs() < 10.0);
//! ```

use geo::{Distance, Haversine, Point};
use crate::{Bounds, GpsPoint};

/// Great-circle distance between two points in meters.
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance between two points in kilometers.
#[inline]
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance(p1, p2) / 1000.0
}

/// Total length of a path in meters. Fewer than two points yields 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Bounding box of a set of points, `None` for empty input.
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Arithmetic mean of all latitudes and longitudes.
///
/// Used to center map views. Returns (0, 0) for empty input. Not meaningful
/// for point sets straddling the antimeridian.
pub fn compute_center(points: &[GpsPoint]) -> GpsPoint {
    if points.is_empty() {
        return GpsPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    GpsPoint::new(sum_lat / n, sum_lng / n)
}
