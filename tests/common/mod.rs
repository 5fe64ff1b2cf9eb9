//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use photo_trip::{GpsMetadata, MediaMetadata, MetadataReader, Rational};

/// Metadata keyed by file name.
#[derive(Default)]
pub struct FakeReader {
    pub by_name: HashMap<String, MediaMetadata>,
}

impl MetadataReader for FakeReader {
    fn read(&self, path: &Path) -> Option<MediaMetadata> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        self.by_name.get(&name).cloned()
    }
}

impl FakeReader {
    /// Create an empty photo file under `root/folder` and register its metadata.
    pub fn add(&mut self, root: &Path, folder: &str, name: &str, meta: MediaMetadata) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), b"jpeg").unwrap();
        self.by_name.insert(name.to_string(), meta);
    }
}

fn degrees(value: f64) -> [Rational; 3] {
    let micro = (value * 1_000_000.0).round() as u32;
    [Rational::new(micro, 1_000_000), Rational::new(0, 1), Rational::new(0, 1)]
}

/// Capture time only, `YYYY:MM:DD HH:MM:SS`.
pub fn taken(date: &str) -> MediaMetadata {
    MediaMetadata { date_time_original: Some(date.to_string()), ..Default::default() }
}

/// Capture time plus a north/east GPS fix.
pub fn geotagged(date: &str, lat: f64, lon: f64) -> MediaMetadata {
    MediaMetadata {
        gps: Some(GpsMetadata {
            latitude: Some(degrees(lat)),
            latitude_ref: Some('N'),
            longitude: Some(degrees(lon)),
            longitude_ref: Some('E'),
            ..Default::default()
        }),
        ..taken(date)
    }
}
