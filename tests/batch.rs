//! Batch archive generation over several photo folders.

mod common;

use std::fs;

use common::{geotagged, FakeReader};
use photo_trip::{batch_process, GpsPoint, InferenceMode, StaticGeocoder, TripConfig};
use tempfile::tempdir;

#[test]
fn test_batch_builds_archive() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("library");
    let mut reader = FakeReader::default();

    for (i, hour) in [9, 10, 11].into_iter().enumerate() {
        let meta = geotagged(&format!("2019:08:03 {:02}:00:00", hour), 41.9, 12.5);
        reader.add(&root, "Italy 2019", &format!("IMG_{}.jpg", i), meta);
    }
    for (i, hour) in [8, 12, 16].into_iter().enumerate() {
        let meta = geotagged(&format!("2021:02:10 {:02}:00:00", hour), 47.26, 11.39);
        reader.add(&root, "Skiing", &format!("SKI_{}.jpg", i), meta);
    }
    fs::create_dir_all(root.join("Empty")).unwrap();
    fs::create_dir_all(root.join(".cache")).unwrap();

    let geocoder = StaticGeocoder::new().with_address(
        GpsPoint::new(41.9, 12.5),
        "Via del Corso, Rome, Lazio, 00186, Italy",
    );
    let out = root.join("TripArchive");
    let config = TripConfig { inference: InferenceMode::Interpolate, ..Default::default() };

    let summary = batch_process(&root, &out, &config, &reader, &geocoder).unwrap();
    assert_eq!(summary.folders_processed, 2);
    assert_eq!(summary.folders_skipped, 1);

    let names: Vec<&str> = summary.trips.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["2019_Lazio", "2021_Skiing_02-10"]);

    let trip_dir = out.join("2019_Lazio");
    for ext in ["gpx", "md", "csv", "html"] {
        assert!(trip_dir.join(format!("2019_Lazio.{}", ext)).exists(), "missing .{}", ext);
    }
    assert!(out.join("2019").join("index.html").exists());
    assert!(out.join("2021").join("index.html").exists());

    let master = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(master.contains("2021_Skiing_02-10/2021_Skiing_02-10.html"));
    assert!(master.contains("<h3>Lazio</h3>"));

    // The archive inside the root is not treated as a photo folder
    let again = batch_process(&root, &out, &config, &reader, &geocoder).unwrap();
    assert_eq!(again.folders_processed + again.folders_skipped, 3);
}
