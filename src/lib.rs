//! # Photo Trip
//!
//! Reconstructs travel itineraries from unordered collections of timestamped,
//! optionally geotagged photos.
//!
//! This library provides:
//! - Best-effort timestamp and coordinate resolution per photo
//! - Location inference (temporal interpolation, then folder-name geocoding)
//! - A persistent per-root location cache
//! - Trip segmentation using combined time and great-circle distance gaps
//! - GPX, Markdown, CSV and HTML map exports
//!
//! ## Features
//!
//! - **`parallel`** - Process batch roots in parallel with rayon
//! - **`http`** - Enable the Nominatim geocoding client
//! - **`exif`** - Enable the EXIF metadata reader
//! - **`cli`** - Build the `photo-trip` command-line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use photo_trip::{segment, GpsPoint, SegmentConfig, TripPoint};
//!
//! let day = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
//! let points = vec![
//!     TripPoint::new(day.and_hms_opt(9, 0, 0).unwrap(), GpsPoint::new(48.85, 2.35)),
//!     TripPoint::new(day.and_hms_opt(9, 30, 0).unwrap(), GpsPoint::new(48.86, 2.36)),
//!     TripPoint::new(day.and_hms_opt(14, 0, 0).unwrap(), GpsPoint::new(48.20, 16.37)),
//! ];
//!
//! let clusters = segment(points, &SegmentConfig::default());
//! assert_eq!(clusters.len(), 2); // Paris, then Vienna
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Unified error handling
pub mod error;
pub use error::{Result, TripError};

// Geographic utilities (distance, bounds, center calculations)
pub mod geo_utils;

// Media metadata interface (EXIF collaborator)
pub mod metadata;
pub use metadata::{GpsMetadata, MediaMetadata, MetadataReader, NoMetadata, Rational};
#[cfg(feature = "exif")]
pub use metadata::ExifReader;

// Timestamp and coordinate resolution
pub mod timestamp;
pub use timestamp::{
    FilenamePattern, PatternKind, ResolvedTimestamp, TimestampConfig, TimestampResolver,
    TimestampSource,
};
pub mod coordinate;
pub use coordinate::{dms_to_decimal, resolve_coordinate};

// Persistent location cache
pub mod cache;
pub use cache::{CachedLocation, LocationCache};

// Geocoding capability interface
pub mod geocode;
pub use geocode::{Geocoder, MemoGeocoder, NoGeocoder, StaticGeocoder};

// Nominatim client with dispatch rate limiting
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::NominatimGeocoder;

// Location inference (interpolation + contextual geocoding)
pub mod inference;
pub use inference::{
    assign_manual_locations, infer_locations, interpolate, HintConfig, InferenceOutcome,
    KnownPositions, LocationHinter, LocationPrompt, PhotoGroup,
};

// Timeline merging and date filtering
pub mod timeline;
pub use timeline::{merge_timelines, DateRange, Timestamped};

// Trip segmentation
pub mod segmentation;
pub use segmentation::{retain_min_size, segment, Cluster, SegmentConfig};

// Directory scanning
pub mod scan;
pub use scan::{find_gpx_files, scan_folder, scan_folders, ScanConfig, ScanResult};

// Exporters
pub mod gpx_io;
pub mod map;
pub mod report;
pub use map::MapStyle;

// Custom routes from place names
pub mod route;
pub use route::{build_route, load_custom_locations, RouteStop};

// End-to-end orchestration
pub mod pipeline;
pub use pipeline::{
    build_trip, write_outputs, InferenceMode, OutputNames, Sources, TripConfig, TripPlan,
    TripStats,
};

// Batch mode over many roots
pub mod batch;
pub use batch::{batch_process, BatchSummary, TripEntry};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use photo_trip::GpsPoint;
/// let point = GpsPoint::new(48.8566, 2.3522); // Paris
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box for a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Where an item came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
    /// A photo on disk
    File(PathBuf),
    /// A point of an imported GPX track
    TrackPoint { file: PathBuf, index: usize },
    /// A named waypoint of a custom route
    Waypoint(String),
}

impl SourceRef {
    /// Path of the backing photo, if this is a photo.
    pub fn photo_path(&self) -> Option<&Path> {
        match self {
            SourceRef::File(path) => Some(path),
            _ => None,
        }
    }

    /// Short label for exports: the file name, waypoint name, or "GPX Point".
    pub fn display_name(&self) -> String {
        match self {
            SourceRef::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SourceRef::TrackPoint { .. } => "GPX Point".to_string(),
            SourceRef::Waypoint(name) => name.clone(),
        }
    }
}

/// How a coordinate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionOrigin {
    /// Read from the photo's GPS metadata or a GPX track
    Measured,
    /// Linearly interpolated between neighbouring measured items
    Interpolated,
    /// Geocoded from a folder name hint
    Geocoded,
    /// Reused from the location cache
    Cached,
    /// Geocoded from a place name typed by the user
    Manual,
}

/// A resolved coordinate plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub point: GpsPoint,
    pub origin: PositionOrigin,
}

/// A timestamped point of interest whose coordinate may still be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub timestamp: NaiveDateTime,
    pub position: Option<Position>,
    /// Measured altitude in meters (never inferred)
    pub altitude: Option<f64>,
    pub source: Option<SourceRef>,
}

impl Item {
    /// Create an item with no coordinate yet.
    pub fn unpositioned(timestamp: NaiveDateTime, source: Option<SourceRef>) -> Self {
        Self { timestamp, position: None, altitude: None, source }
    }

    /// Convert into a [`TripPoint`] if a coordinate is known.
    pub fn located(self) -> Option<TripPoint> {
        let position = self.position?;
        Some(TripPoint {
            timestamp: self.timestamp,
            point: position.point,
            altitude: self.altitude,
            source: self.source,
            origin: position.origin,
        })
    }

    /// Attach a coordinate, producing a [`TripPoint`].
    pub fn locate(self, point: GpsPoint, origin: PositionOrigin) -> TripPoint {
        TripPoint {
            timestamp: self.timestamp,
            point,
            altitude: self.altitude,
            source: self.source,
            origin,
        }
    }

    /// Path of the backing photo, if any.
    pub fn photo_path(&self) -> Option<&Path> {
        self.source.as_ref().and_then(SourceRef::photo_path)
    }
}

/// An item with both timestamp and coordinate populated.
///
/// Only trip points enter segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPoint {
    pub timestamp: NaiveDateTime,
    pub point: GpsPoint,
    pub altitude: Option<f64>,
    pub source: Option<SourceRef>,
    pub origin: PositionOrigin,
}

impl TripPoint {
    /// Create a measured point with no altitude or source.
    pub fn new(timestamp: NaiveDateTime, point: GpsPoint) -> Self {
        Self {
            timestamp,
            point,
            altitude: None,
            source: None,
            origin: PositionOrigin::Measured,
        }
    }

    pub fn with_altitude(mut self, altitude: Option<f64>) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_origin(mut self, origin: PositionOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Label used by exports ("GPX Point" when there is no source).
    pub fn display_name(&self) -> String {
        self.source
            .as_ref()
            .map(SourceRef::display_name)
            .unwrap_or_else(|| "GPX Point".to_string())
    }

    /// Path of the backing photo, if any.
    pub fn photo_path(&self) -> Option<&Path> {
        self.source.as_ref().and_then(SourceRef::photo_path)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 15).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(48.8566, 2.3522).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_center() {
        let bounds = Bounds::from_points(&[GpsPoint::new(48.0, 2.0), GpsPoint::new(50.0, 4.0)]).unwrap();
        assert_eq!(bounds.center(), GpsPoint::new(49.0, 3.0));
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_item_located() {
        let item = Item::unpositioned(at(9, 0), Some(SourceRef::File("a/b.jpg".into())));
        assert!(item.clone().located().is_none());

        let point = item.locate(GpsPoint::new(1.0, 2.0), PositionOrigin::Interpolated);
        assert_eq!(point.origin, PositionOrigin::Interpolated);
        assert_eq!(point.display_name(), "b.jpg");
    }

    #[test]
    fn test_display_names() {
        let gpx = SourceRef::TrackPoint { file: "t.gpx".into(), index: 3 };
        assert_eq!(gpx.display_name(), "GPX Point");
        assert_eq!(SourceRef::Waypoint("Rome".into()).display_name(), "Rome");
        assert_eq!(TripPoint::new(at(1, 0), GpsPoint::new(0.0, 0.0)).display_name(), "GPX Point");
    }
}
