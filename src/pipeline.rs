//! # Trip Pipeline
//!
//! End-to-end reconstruction for one invocation:
//!
//! 1. Scan every photo root and load imported GPX tracks
//! 2. Per root: load its location cache, infer missing coordinates, save once
//! 3. Merge photos and track points into one timeline
//! 4. Segment and drop clusters below the minimum size
//!
//! Exporting is a separate step ([`write_outputs`]) so callers can preview
//! the plan before anything is written.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::LocationCache;
use crate::error::{Result, TripError};
use crate::geocode::{Geocoder, MemoGeocoder};
use crate::gpx_io;
use crate::inference::{assign_manual_locations, infer_locations, HintConfig, LocationHinter, LocationPrompt};
use crate::map::{write_map, MapStyle};
use crate::metadata::MetadataReader;
use crate::report::{write_csv, write_summary};
use crate::scan::{find_gpx_files, scan_folder, ScanConfig, ScanResult};
use crate::segmentation::{retain_min_size, segment, Cluster, SegmentConfig};
use crate::timeline::merge_timelines;
use crate::timestamp::{TimestampConfig, TimestampResolver};
use crate::TripPoint;

// ============================================================================
// Configuration
// ============================================================================

/// What to do with photos that have no GPS data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Leave them out of the trip
    #[default]
    None,
    /// Interpolate from neighbours, then geocode folder names
    Interpolate,
    /// Ask the user for a place name per folder
    Manual,
}

/// Complete configuration of a trip run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripConfig {
    pub segment: SegmentConfig,
    pub timestamp: TimestampConfig,
    pub hints: HintConfig,
    pub scan: ScanConfig,
    pub inference: InferenceMode,
    /// Reverse geocode addresses into the summary and CSV (default: false)
    pub geocode_addresses: bool,
}

impl TripConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: TripConfig = serde_json::from_str(&text)?;
        info!("[Pipeline] Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Inputs of a trip run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources {
    /// Photo roots; each keeps its own location cache
    pub folders: Vec<PathBuf>,
    /// GPX files imported as reference tracks
    pub gpx_imports: Vec<PathBuf>,
    /// Directories searched recursively for more GPX files
    pub gpx_search_dirs: Vec<PathBuf>,
    /// Use the imported tracks as a single segment instead of clustering
    pub gpx_as_route: bool,
}

impl Sources {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.gpx_imports.is_empty() && self.gpx_search_dirs.is_empty()
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Counters collected while building a trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TripStats {
    pub photos_with_gps: usize,
    pub photos_without_gps: usize,
    /// Photos that received a coordinate through inference
    pub inferred: usize,
    /// Photos left out because no coordinate could be found
    pub unresolved: usize,
    pub track_points: usize,
    /// Photos without any usable timestamp
    pub skipped: usize,
    /// Photos outside the date range
    pub filtered: usize,
    /// Clusters dropped by the minimum size filter
    pub dropped_clusters: usize,
}

/// Segmented trip, ready for export.
#[derive(Debug, Clone)]
pub struct TripPlan {
    pub clusters: Vec<Cluster>,
    pub stats: TripStats,
}

impl TripPlan {
    pub fn total_points(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}

// ============================================================================
// Build
// ============================================================================

/// Load every imported and discovered GPX file into one sorted timeline.
///
/// Unreadable files are logged and skipped.
pub fn load_tracks(sources: &Sources, config: &ScanConfig) -> Vec<TripPoint> {
    let mut files = sources.gpx_imports.clone();
    if !sources.gpx_search_dirs.is_empty() {
        let found = find_gpx_files(&sources.gpx_search_dirs);
        info!("[Pipeline] Found {} GPX files", found.len());
        files.extend(found);
    }

    let tracks: Vec<Vec<TripPoint>> = files
        .iter()
        .filter_map(|path| match gpx_io::load_track(path) {
            Ok(points) => Some(points),
            Err(e) => {
                warn!("[Pipeline] Skipping GPX file {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    let merged = merge_timelines(tracks);
    match &config.date_range {
        Some(range) => range.filter(merged),
        None => merged,
    }
}

/// Build a segmented trip from the given sources.
///
/// `prompt` is only used in [`InferenceMode::Manual`]; without one, manual
/// mode leaves unpositioned photos out.
///
/// # Errors
///
/// [`TripError::NoUsableItems`] when nothing carries a coordinate,
/// [`TripError::NoClusters`] when every cluster is below the minimum size.
/// Invalid pattern tables and unreadable roots are reported as well.
pub fn build_trip(
    sources: &Sources,
    config: &TripConfig,
    reader: &dyn MetadataReader,
    geocoder: &dyn Geocoder,
    mut prompt: Option<&mut dyn LocationPrompt>,
) -> Result<TripPlan> {
    config.segment.validate()?;
    let resolver = TimestampResolver::new(&config.timestamp)?;
    let hinter = LocationHinter::new(&config.hints)?;
    let mut stats = TripStats::default();

    let tracks = load_tracks(sources, &config.scan);
    stats.track_points = tracks.len();

    let mut scans: Vec<(&PathBuf, ScanResult)> = Vec::with_capacity(sources.folders.len());
    for root in &sources.folders {
        let scan = scan_folder(root, &config.scan, &resolver, reader)?;
        stats.photos_with_gps += scan.positioned.len();
        stats.photos_without_gps += scan.unpositioned.len();
        stats.skipped += scan.skipped;
        stats.filtered += scan.filtered;
        scans.push((root, scan));
    }

    // Every measured point anchors interpolation, across all roots
    let anchors = merge_timelines(
        scans
            .iter()
            .map(|(_, scan)| scan.positioned.clone())
            .chain(std::iter::once(tracks.clone())),
    );

    let mut timelines: Vec<Vec<TripPoint>> = Vec::with_capacity(scans.len() * 2 + 1);
    for (root, scan) in scans {
        let ScanResult { positioned, unpositioned, .. } = scan;
        timelines.push(positioned);
        if unpositioned.is_empty() {
            continue;
        }

        let outcome = match (config.inference, prompt.as_deref_mut()) {
            (InferenceMode::None, _) => {
                warn!(
                    "[Pipeline] {} photos in {} have no GPS data and are left out",
                    unpositioned.len(),
                    root.display()
                );
                stats.unresolved += unpositioned.len();
                continue;
            }
            (InferenceMode::Manual, None) => {
                warn!("[Pipeline] Manual mode without a prompt, leaving out {} photos", unpositioned.len());
                stats.unresolved += unpositioned.len();
                continue;
            }
            (InferenceMode::Interpolate, _) => {
                let cache = LocationCache::load(root);
                infer_locations(unpositioned, &anchors, cache, root, &hinter, geocoder)
            }
            (InferenceMode::Manual, Some(prompt)) => {
                let cache = LocationCache::load(root);
                assign_manual_locations(unpositioned, cache, root, prompt, geocoder)
            }
        };

        if let Err(e) = outcome.cache.save(root) {
            warn!("[Pipeline] Could not save location cache for {}: {}", root.display(), e);
        }
        stats.inferred += outcome.located.len();
        stats.unresolved += outcome.unresolved.len();
        timelines.push(outcome.located);
    }

    if sources.gpx_as_route && !sources.gpx_imports.is_empty() {
        info!("[Pipeline] Using imported GPX route with {} points as a single segment", tracks.len());
        let clusters: Vec<Cluster> = Cluster::new(tracks).into_iter().collect();
        if clusters.is_empty() {
            return Err(TripError::NoUsableItems);
        }
        return Ok(TripPlan { clusters, stats });
    }

    timelines.push(tracks);
    let points = merge_timelines(timelines);
    if points.is_empty() {
        return Err(TripError::NoUsableItems);
    }
    info!("[Pipeline] {} photos/points with location data", points.len());

    let clusters = segment(points, &config.segment);
    let found = clusters.len();
    let min_size = config.segment.min_cluster_size;
    let clusters = retain_min_size(clusters, min_size);
    stats.dropped_clusters = found - clusters.len();
    if stats.dropped_clusters > 0 {
        info!(
            "[Pipeline] Filtered out {} segments with fewer than {} items",
            stats.dropped_clusters, min_size
        );
    }
    if clusters.is_empty() {
        return Err(TripError::NoClusters { min_items: min_size });
    }

    info!("[Pipeline] Identified {} trip segments", clusters.len());
    Ok(TripPlan { clusters, stats })
}

// ============================================================================
// Export
// ============================================================================

/// Output file names, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub gpx: String,
    pub markdown: String,
    pub csv: String,
    pub html: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            gpx: "trip.gpx".to_string(),
            markdown: "trip.md".to_string(),
            csv: "trip.csv".to_string(),
            html: "trip.html".to_string(),
        }
    }
}

impl OutputNames {
    /// All four files named `<stem>.<ext>`.
    pub fn with_stem(stem: &str) -> Self {
        Self {
            gpx: format!("{}.gpx", stem),
            markdown: format!("{}.md", stem),
            csv: format!("{}.csv", stem),
            html: format!("{}.html", stem),
        }
    }
}

/// Paths of the written files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub gpx: PathBuf,
    pub markdown: PathBuf,
    pub csv: PathBuf,
    pub html: PathBuf,
}

/// Write GPX, Markdown, CSV and HTML exports for `clusters` into `out_dir`.
///
/// With a geocoder, the summary and CSV carry reverse-geocoded addresses;
/// each distinct coordinate is looked up once.
pub fn write_outputs(
    clusters: &[Cluster],
    out_dir: &Path,
    names: &OutputNames,
    geocoder: Option<&dyn Geocoder>,
    map_style: MapStyle,
) -> Result<WrittenOutputs> {
    fs::create_dir_all(out_dir)?;
    let outputs = WrittenOutputs {
        gpx: out_dir.join(&names.gpx),
        markdown: out_dir.join(&names.markdown),
        csv: out_dir.join(&names.csv),
        html: out_dir.join(&names.html),
    };

    let memo = geocoder.map(MemoGeocoder::new);
    let addresses = memo.as_ref().map(|m| m as &dyn Geocoder);

    gpx_io::write_clusters(clusters, &outputs.gpx)?;
    write_summary(clusters, &outputs.markdown, addresses)?;
    write_csv(clusters, &outputs.csv, addresses)?;
    write_map(clusters, &outputs.html, map_style)?;
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{NoGeocoder, StaticGeocoder};
    use crate::metadata::NoMetadata;
    use crate::GpsPoint;
    use tempfile::tempdir;

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="48.85" lon="2.35"><time>2023-06-15T09:00:00Z</time></trkpt>
    <trkpt lat="48.86" lon="2.36"><time>2023-06-15T09:30:00Z</time></trkpt>
    <trkpt lat="48.87" lon="2.37"><time>2023-06-15T10:00:00Z</time></trkpt>
    <trkpt lat="48.20" lon="16.37"><time>2023-06-15T20:00:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

    fn track_sources(dir: &Path, as_route: bool) -> Sources {
        let path = dir.join("track.gpx");
        fs::write(&path, TRACK).unwrap();
        Sources { gpx_imports: vec![path], gpx_as_route: as_route, ..Default::default() }
    }

    #[test]
    fn test_track_only_trip() {
        let dir = tempdir().unwrap();
        let sources = track_sources(dir.path(), false);
        let mut config = TripConfig::default();
        config.segment.min_cluster_size = 1;

        let plan = build_trip(&sources, &config, &NoMetadata, &NoGeocoder, None).unwrap();
        assert_eq!(plan.clusters.len(), 2);
        assert_eq!(plan.stats.track_points, 4);
        assert_eq!(plan.total_points(), 4);
    }

    #[test]
    fn test_min_size_filter_and_empty_results() {
        let dir = tempdir().unwrap();
        let sources = track_sources(dir.path(), false);

        let plan = build_trip(&sources, &TripConfig::default(), &NoMetadata, &NoGeocoder, None).unwrap();
        assert_eq!(plan.clusters.len(), 1);
        assert_eq!(plan.stats.dropped_clusters, 1);

        let mut strict = TripConfig::default();
        strict.segment.min_cluster_size = 10;
        let err = build_trip(&sources, &strict, &NoMetadata, &NoGeocoder, None).unwrap_err();
        assert!(matches!(err, TripError::NoClusters { min_items: 10 }));

        let err = build_trip(&Sources::default(), &strict, &NoMetadata, &NoGeocoder, None).unwrap_err();
        assert!(matches!(err, TripError::NoUsableItems));
    }

    #[test]
    fn test_invalid_gap_is_reported() {
        let dir = tempdir().unwrap();
        let sources = track_sources(dir.path(), false);
        let mut config = TripConfig::default();
        config.segment.time_gap_hours = -1e300;

        let err = build_trip(&sources, &config, &NoMetadata, &NoGeocoder, None).unwrap_err();
        assert!(matches!(err, TripError::InvalidConfig(_)));
        assert!(!err.is_empty_result());
    }

    #[test]
    fn test_gpx_as_route_is_one_segment() {
        let dir = tempdir().unwrap();
        let sources = track_sources(dir.path(), true);
        let plan = build_trip(&sources, &TripConfig::default(), &NoMetadata, &NoGeocoder, None).unwrap();
        assert_eq!(plan.clusters.len(), 1);
        assert_eq!(plan.clusters[0].len(), 4);
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"segment": {"time_gap_hours": 6.0}, "inference": "interpolate"}"#).unwrap();

        let config = TripConfig::from_json_file(&path).unwrap();
        assert_eq!(config.segment.time_gap_hours, 6.0);
        assert_eq!(config.segment.distance_gap_km, 25.0);
        assert_eq!(config.inference, InferenceMode::Interpolate);
        assert_eq!(config.scan, ScanConfig::default());
    }

    #[test]
    fn test_write_outputs_creates_all_files() {
        let dir = tempdir().unwrap();
        let sources = track_sources(dir.path(), false);
        let mut config = TripConfig::default();
        config.segment.min_cluster_size = 1;
        let plan = build_trip(&sources, &config, &NoMetadata, &NoGeocoder, None).unwrap();

        let geocoder = StaticGeocoder::new().with_address(GpsPoint::new(48.85, 2.35), "Paris, France");
        let out = dir.path().join("Route");
        let written =
            write_outputs(&plan.clusters, &out, &OutputNames::default(), Some(&geocoder), MapStyle::Advanced)
                .unwrap();

        for path in [&written.gpx, &written.markdown, &written.csv, &written.html] {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert!(fs::read_to_string(&written.markdown).unwrap().contains("Paris, France"));
        // Summary and CSV share lookups: 4 distinct coordinates
        assert_eq!(geocoder.reverse_calls(), 4);
    }

    #[test]
    fn test_output_names_with_stem() {
        let names = OutputNames::with_stem("2023_Rome");
        assert_eq!(names.gpx, "2023_Rome.gpx");
        assert_eq!(names.html, "2023_Rome.html");
    }
}
