//! Infer missing photo locations and split a day into trip segments.
//!
//! Run with: cargo run --example segment_trip

use chrono::{NaiveDate, NaiveDateTime};
use photo_trip::{
    infer_locations, merge_timelines, segment, GpsPoint, HintConfig, Item, LocationCache,
    LocationHinter, SegmentConfig, SourceRef, StaticGeocoder, TripPoint,
};
use std::path::Path;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 15)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap_or_default()
}

fn main() {
    let root = Path::new("/photos");

    // Photos with GPS: a morning in Paris, an evening in Vienna
    let measured = vec![
        TripPoint::new(at(9, 0), GpsPoint::new(48.8566, 2.3522))
            .with_source(SourceRef::File(root.join("Paris/IMG_0001.jpg"))),
        TripPoint::new(at(11, 0), GpsPoint::new(48.8606, 2.3376))
            .with_source(SourceRef::File(root.join("Paris/IMG_0002.jpg"))),
        TripPoint::new(at(20, 0), GpsPoint::new(48.2082, 16.3738))
            .with_source(SourceRef::File(root.join("Vienna/IMG_0003.jpg"))),
    ];

    // Photos without GPS: one between the Paris shots, one after the last
    // measured photo (reuses the Vienna fix)
    let missing = vec![
        Item::unpositioned(at(10, 0), Some(SourceRef::File(root.join("Paris/IMG_0004.jpg")))),
        Item::unpositioned(at(21, 0), Some(SourceRef::File(root.join("2023_Vienna/IMG_0005.jpg")))),
    ];

    let hinter = match LocationHinter::new(&HintConfig::default()) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Invalid hint configuration: {}", e);
            return;
        }
    };
    let geocoder = StaticGeocoder::new().with_place("Vienna", GpsPoint::new(48.2082, 16.3738));

    let outcome = infer_locations(missing, &measured, LocationCache::new(), root, &hinter, &geocoder);
    println!("Inferred {} locations, {} unresolved", outcome.located.len(), outcome.unresolved.len());
    for point in &outcome.located {
        println!(
            "  {} -> {:.4}, {:.4} ({:?})",
            point.display_name(),
            point.point.latitude,
            point.point.longitude,
            point.origin
        );
    }
    println!("Cache now holds {} entries\n", outcome.cache.len());

    let timeline = merge_timelines(vec![measured, outcome.located]);
    let config = SegmentConfig::default();
    println!(
        "Segmenting {} points (gap {}h, {}km):",
        timeline.len(),
        config.time_gap_hours,
        config.distance_gap_km
    );

    for (idx, cluster) in segment(timeline, &config).iter().enumerate() {
        println!(
            "  Segment {}: {} points, {} to {}, {:.1} km",
            idx + 1,
            cluster.len(),
            cluster.start().format("%H:%M"),
            cluster.end().format("%H:%M"),
            cluster.distance_m() / 1000.0
        );
    }
}
