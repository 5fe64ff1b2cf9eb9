//! End-to-end runs over a temporary photo tree.

mod common;

use std::fs;
use std::path::Path;

use common::{geotagged, taken, FakeReader};
use photo_trip::cache::LocationCache;
use photo_trip::{
    build_trip, write_outputs, InferenceMode, MapStyle, OutputNames, PhotoGroup, PositionOrigin, Sources,
    StaticGeocoder, TripConfig, TripError,
};
use tempfile::tempdir;

/// Paris: two geotagged photos around one without GPS.
/// Florence: two photos without GPS, a week later.
fn photo_tree(root: &Path) -> FakeReader {
    let mut reader = FakeReader::default();
    let photos = [
        ("Paris", "IMG_a.jpg", geotagged("2023:06:13 09:00:00", 48.85, 2.35)),
        ("Paris", "IMG_b.jpg", geotagged("2023:06:13 11:00:00", 48.87, 2.37)),
        ("Paris", "IMG_c.jpg", taken("2023:06:13 10:00:00")),
        ("Florence", "IMG_d.jpg", taken("2023:06:20 12:00:00")),
        ("Florence", "IMG_e.jpg", taken("2023:06:20 13:00:00")),
    ];
    for (folder, name, meta) in photos {
        reader.add(root, folder, name, meta);
    }
    reader
}

fn config(mode: InferenceMode) -> TripConfig {
    let mut config = TripConfig { inference: mode, ..Default::default() };
    config.segment.min_cluster_size = 1;
    config
}

fn florence() -> StaticGeocoder {
    StaticGeocoder::new().with_place("Florence", photo_trip::GpsPoint::new(43.77, 11.25))
}

#[test]
fn test_interpolation_fills_every_photo_near_anchors() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("photos");
    let reader = photo_tree(&root);
    let sources = Sources { folders: vec![root.clone()], ..Default::default() };

    let geocoder = florence();
    let plan = build_trip(&sources, &config(InferenceMode::Interpolate), &reader, &geocoder, None).unwrap();
    assert_eq!(plan.clusters.len(), 2);
    assert_eq!(plan.stats.photos_with_gps, 2);
    assert_eq!(plan.stats.inferred, 3);
    assert_eq!(plan.stats.unresolved, 0);
    assert_eq!(geocoder.forward_calls(), 0);

    let paris = plan.clusters[0].points();
    assert_eq!(paris.len(), 3);
    assert_eq!(paris[1].origin, PositionOrigin::Interpolated);
    assert!((paris[1].point.latitude - 48.86).abs() < 1e-6);
    assert!((paris[1].point.longitude - 2.36).abs() < 1e-6);

    // Only an earlier anchor exists for the Florence photos: its fix is reused
    let later = plan.clusters[1].points();
    assert!(later.iter().all(|p| p.origin == PositionOrigin::Interpolated));
    assert!(later.iter().all(|p| (p.point.latitude - 48.87).abs() < 1e-9));

    let cache = LocationCache::load(&root);
    assert!(cache.contains("Paris/IMG_c.jpg"));
    assert!(cache.contains("Florence/IMG_d.jpg"));
}

#[test]
fn test_geocode_folder_then_reuse_cache() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("photos");
    let mut reader = FakeReader::default();
    reader.add(&root, "Florence", "IMG_d.jpg", taken("2023:06:20 12:00:00"));
    reader.add(&root, "Florence", "IMG_e.jpg", taken("2023:06:20 13:00:00"));
    let sources = Sources { folders: vec![root.clone()], ..Default::default() };

    let geocoder = florence();
    let plan = build_trip(&sources, &config(InferenceMode::Interpolate), &reader, &geocoder, None).unwrap();
    assert_eq!(geocoder.forward_calls(), 1);
    assert_eq!(plan.clusters.len(), 1);
    assert!(plan.clusters[0].points().iter().all(|p| p.origin == PositionOrigin::Geocoded));
    assert!(LocationCache::load(&root).contains("Florence"));

    // Second run: the folder key answers, no lookups
    let geocoder = florence();
    let plan = build_trip(&sources, &config(InferenceMode::Interpolate), &reader, &geocoder, None).unwrap();
    assert_eq!(geocoder.forward_calls(), 0);
    assert!(plan.clusters[0].points().iter().all(|p| p.origin == PositionOrigin::Cached));
}

#[test]
fn test_without_inference_only_measured_photos_remain() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("photos");
    let reader = photo_tree(&root);
    let sources = Sources { folders: vec![root.clone()], ..Default::default() };

    let plan = build_trip(&sources, &config(InferenceMode::None), &reader, &florence(), None).unwrap();
    assert_eq!(plan.clusters.len(), 1);
    assert_eq!(plan.clusters[0].len(), 2);
    assert_eq!(plan.stats.unresolved, 3);
    assert!(!LocationCache::cache_path(&root).exists());
}

#[test]
fn test_manual_mode_asks_per_folder() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("photos");
    let reader = photo_tree(&root);
    let sources = Sources { folders: vec![root.clone()], ..Default::default() };

    let mut asked = Vec::new();
    let mut prompt = |group: &PhotoGroup| {
        asked.push((group.name(), group.count));
        (group.name() == "Florence").then(|| "Florence".to_string())
    };
    let plan =
        build_trip(&sources, &config(InferenceMode::Manual), &reader, &florence(), Some(&mut prompt)).unwrap();

    assert_eq!(asked, vec![("Florence".to_string(), 2), ("Paris".to_string(), 1)]);
    assert_eq!(plan.stats.inferred, 2);
    assert_eq!(plan.stats.unresolved, 1);
    assert!(plan.clusters[1].points().iter().all(|p| p.origin == PositionOrigin::Manual));

    let cache = LocationCache::load(&root);
    assert!(cache.contains("Florence/IMG_d.jpg"));
    assert!(cache.contains("Florence/IMG_e.jpg"));
}

#[test]
fn test_nothing_usable() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("photos");
    fs::create_dir_all(&root).unwrap();
    let sources = Sources { folders: vec![root], ..Default::default() };

    let err = build_trip(&sources, &config(InferenceMode::Interpolate), &FakeReader::default(), &florence(), None)
        .unwrap_err();
    assert!(matches!(err, TripError::NoUsableItems));
    assert!(err.is_empty_result());
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempdir().unwrap();
    let sources = Sources { folders: vec![dir.path().join("nope")], ..Default::default() };
    let err = build_trip(&sources, &config(InferenceMode::None), &FakeReader::default(), &florence(), None)
        .unwrap_err();
    assert!(matches!(err, TripError::Io(_)));
}

#[test]
fn test_outputs_from_photo_tree() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("photos");
    let reader = photo_tree(&root);
    let sources = Sources { folders: vec![root.clone()], ..Default::default() };
    let plan = build_trip(&sources, &config(InferenceMode::Interpolate), &reader, &florence(), None).unwrap();

    let written =
        write_outputs(&plan.clusters, &root.join("Route"), &OutputNames::default(), None, MapStyle::Basic).unwrap();

    let gpx = fs::read_to_string(&written.gpx).unwrap();
    assert_eq!(gpx.matches("<trk>").count(), 2);
    let csv = fs::read_to_string(&written.csv).unwrap();
    assert_eq!(csv.lines().count(), 6);
    assert!(csv.contains("IMG_c.jpg"));
    let md = fs::read_to_string(&written.markdown).unwrap();
    assert!(md.contains("## Segment 2 - 2023-06-20"));
}
