//! Directory scanning.
//!
//! Walks a root, resolves a timestamp and coordinate for every image, and
//! splits the result into positioned and unpositioned photos.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::coordinate::resolve_coordinate;
use crate::error::Result;
use crate::metadata::MetadataReader;
use crate::timeline::DateRange;
use crate::timestamp::TimestampResolver;
use crate::{Item, SourceRef, TripPoint};

/// Configuration for directory scanning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as photos (case-insensitive, no dot)
    pub extensions: Vec<String>,
    /// Follow symbolic links while walking
    pub follow_links: bool,
    /// Only keep photos taken within this range
    pub date_range: Option<DateRange>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "jpeg".to_string()],
            follow_links: false,
            date_range: None,
        }
    }
}

impl ScanConfig {
    fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

/// Photos found under one or more roots, each list sorted by time.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub positioned: Vec<TripPoint>,
    pub unpositioned: Vec<Item>,
    /// Photos without any usable timestamp
    pub skipped: usize,
    /// Photos outside the configured date range
    pub filtered: usize,
}

impl ScanResult {
    pub fn total(&self) -> usize {
        self.positioned.len() + self.unpositioned.len()
    }

    /// Combine two scans, keeping both lists sorted.
    pub fn merge(mut self, other: ScanResult) -> Self {
        self.positioned.extend(other.positioned);
        self.unpositioned.extend(other.unpositioned);
        self.positioned.sort_by_key(|p| p.timestamp);
        self.unpositioned.sort_by_key(|i| i.timestamp);
        self.skipped += other.skipped;
        self.filtered += other.filtered;
        self
    }
}

/// Scan a single root.
///
/// Fails only when `root` itself cannot be read; unreadable entries below it
/// are logged and skipped.
pub fn scan_folder(
    root: &Path,
    config: &ScanConfig,
    resolver: &TimestampResolver,
    reader: &dyn MetadataReader,
) -> Result<ScanResult> {
    fs::read_dir(root)?;

    let mut result = ScanResult::default();
    let mut files: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_links) {
        match entry {
            Ok(entry) if entry.file_type().is_file() && config.accepts(entry.path()) => {
                files.push(entry.path().to_path_buf());
            }
            Ok(_) => {}
            Err(e) => warn!("[Scan] Skipping unreadable entry: {}", e),
        }
    }
    files.sort();

    for path in files {
        let metadata = reader.read(&path);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(resolved) = resolver.resolve(metadata.as_ref(), &filename, file_mtime(&path)) else {
            warn!("[Scan] No timestamp for {}", path.display());
            result.skipped += 1;
            continue;
        };

        if let Some(range) = &config.date_range {
            if !range.contains(resolved.time) {
                result.filtered += 1;
                continue;
            }
        }

        let (point, altitude) = metadata.as_ref().map(resolve_coordinate).unwrap_or((None, None));
        debug!(
            "[Scan] {} @ {} ({:?}) gps={}",
            filename,
            resolved.time,
            resolved.source,
            point.is_some()
        );

        let source = SourceRef::File(path);
        match point {
            Some(point) => result.positioned.push(
                TripPoint::new(resolved.time, point)
                    .with_altitude(altitude)
                    .with_source(source),
            ),
            None => result.unpositioned.push(Item::unpositioned(resolved.time, Some(source))),
        }
    }

    result.positioned.sort_by_key(|p| p.timestamp);
    result.unpositioned.sort_by_key(|i| i.timestamp);

    info!(
        "[Scan] {}: {} with GPS, {} without, {} skipped, {} outside date range",
        root.display(),
        result.positioned.len(),
        result.unpositioned.len(),
        result.skipped,
        result.filtered
    );
    Ok(result)
}

/// Scan several roots and merge the results.
pub fn scan_folders(
    roots: &[PathBuf],
    config: &ScanConfig,
    resolver: &TimestampResolver,
    reader: &dyn MetadataReader,
) -> Result<ScanResult> {
    let mut merged = ScanResult::default();
    for root in roots {
        merged = merged.merge(scan_folder(root, config, resolver, reader)?);
    }
    Ok(merged)
}

/// All `.gpx` files below the given directories, sorted.
pub fn find_gpx_files(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("gpx"))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    found.sort();
    found.dedup();
    found
}

fn file_mtime(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}
