//! # Batch Mode
//!
//! Treats every non-hidden subfolder of a root as an independent photo
//! collection. Each resulting cluster becomes its own trip folder named
//! `<year>_<place[-place]>`, and the archive gets per-year and master
//! `index.html` pages for browsing.
//!
//! Roots never share a cache file, so with the `parallel` feature they are
//! scanned and inferred concurrently. Naming and writing stay sequential:
//! both go through the rate-limited geocoder and the shared output folder.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use serde::Serialize;

use crate::error::{Result, TripError};
use crate::geocode::{short_place_name, Geocoder};
use crate::gpx_io::escape_xml;
use crate::inference::LocationHinter;
use crate::map::MapStyle;
use crate::metadata::MetadataReader;
use crate::pipeline::{build_trip, write_outputs, InferenceMode, OutputNames, Sources, TripConfig};
use crate::segmentation::Cluster;
use crate::timestamp::TimestampResolver;

/// Clusters longer than this also name their end point.
const END_NAME_MIN_POINTS: usize = 5;

/// One trip written to the archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripEntry {
    pub year: i32,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub points: usize,
    pub folder: PathBuf,
    pub gpx: PathBuf,
    pub html: PathBuf,
}

impl TripEntry {
    /// Name without the leading `YYYY_` prefix.
    pub fn display_name(&self) -> &str {
        strip_year_prefix(&self.name)
    }

    fn date_label(&self) -> String {
        format!("{} - {}", self.start_date.format("%b %d"), self.end_date.format("%b %d, %Y"))
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub trips: Vec<TripEntry>,
    /// Subfolders that produced at least one trip
    pub folders_processed: usize,
    /// Subfolders without usable data
    pub folders_skipped: usize,
}

// ============================================================================
// Naming
// ============================================================================

/// Replace characters that are not allowed in file names.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') { '_' } else { c })
        .collect()
}

fn strip_year_prefix(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() > 5 && bytes[..4].iter().all(u8::is_ascii_digit) && bytes[4] == b'_' {
        &name[5..]
    } else {
        name
    }
}

/// Trip folder name for a cluster.
///
/// Uses the reverse-geocoded start place, plus the end place for clusters
/// longer than five points. Falls back to `<year>_<folder>_<MM-DD>` when the
/// start cannot be named.
pub fn trip_name(cluster: &Cluster, folder_name: &str, geocoder: &dyn Geocoder) -> String {
    let start = cluster.start().date();
    let mut places: Vec<String> = Vec::new();

    if let Some(address) = geocoder.reverse(&cluster.first().point) {
        places.push(short_place_name(&address));

        if cluster.len() > END_NAME_MIN_POINTS {
            if let Some(address) = geocoder.reverse(&cluster.last().point) {
                let end = short_place_name(&address);
                if !places.contains(&end) {
                    places.push(end);
                }
            }
        }
    }
    places.retain(|p| !p.is_empty());

    let name = if places.is_empty() {
        format!("{}_{}_{}", start.year(), folder_name, start.format("%m-%d"))
    } else {
        format!("{}_{}", start.year(), places.join("-"))
    };
    sanitize_name(&name)
}

fn unique_name(name: String, used: &mut HashSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}_{}", name, n);
        n += 1;
    }
    candidate
}

// ============================================================================
// Processing
// ============================================================================

/// Non-hidden subfolders of `root`, excluding the output folder.
fn photo_folders(root: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let out_canonical = fs::canonicalize(out_dir).ok();
    let mut folders: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .filter(|p| out_canonical.is_none() || fs::canonicalize(p).ok() != out_canonical)
        .collect();
    folders.sort();
    Ok(folders)
}

fn folder_clusters(
    folder: &Path,
    config: &TripConfig,
    reader: &dyn MetadataReader,
    geocoder: &dyn Geocoder,
) -> Option<Vec<Cluster>> {
    let sources = Sources { folders: vec![folder.to_path_buf()], ..Default::default() };
    match build_trip(&sources, config, reader, geocoder, None) {
        Ok(plan) => Some(plan.clusters),
        Err(e) if e.is_empty_result() => {
            info!("[Batch] {}: {}, skipping", folder.display(), e);
            None
        }
        Err(e) => {
            warn!("[Batch] Failed to process {}: {}", folder.display(), e);
            None
        }
    }
}

/// Process every subfolder of `root` into a browsable trip archive at
/// `out_dir`.
///
/// Manual inference is not available here and is treated as interpolation.
pub fn batch_process(
    root: &Path,
    out_dir: &Path,
    config: &TripConfig,
    reader: &dyn MetadataReader,
    geocoder: &dyn Geocoder,
) -> Result<BatchSummary> {
    // Surface bad config once instead of per folder
    config.segment.validate()?;
    TimestampResolver::new(&config.timestamp)?;
    LocationHinter::new(&config.hints)?;

    let mut config = config.clone();
    if config.inference == InferenceMode::Manual {
        warn!("[Batch] Manual locations are not supported in batch mode, interpolating instead");
        config.inference = InferenceMode::Interpolate;
    }

    fs::create_dir_all(out_dir)?;
    let folders = photo_folders(root, out_dir)?;
    info!("[Batch] Found {} folders to process", folders.len());

    #[cfg(feature = "parallel")]
    let results: Vec<Option<Vec<Cluster>>> = {
        use rayon::prelude::*;
        folders
            .par_iter()
            .map(|folder| folder_clusters(folder, &config, reader, geocoder))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<Option<Vec<Cluster>>> = folders
        .iter()
        .map(|folder| folder_clusters(folder, &config, reader, geocoder))
        .collect();

    let addresses = config.geocode_addresses.then_some(geocoder);
    let mut summary = BatchSummary::default();
    let mut used = HashSet::new();

    for (folder, clusters) in folders.iter().zip(results) {
        let Some(clusters) = clusters else {
            summary.folders_skipped += 1;
            continue;
        };
        summary.folders_processed += 1;
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for cluster in clusters {
            let name = unique_name(trip_name(&cluster, &folder_name, geocoder), &mut used);
            let trip_dir = out_dir.join(&name);
            let clusters = [cluster];
            let written = write_outputs(
                &clusters,
                &trip_dir,
                &OutputNames::with_stem(&name),
                addresses,
                MapStyle::Advanced,
            )?;

            let [cluster] = clusters;
            let entry = TripEntry {
                year: cluster.start().year(),
                name,
                start_date: cluster.start().date(),
                end_date: cluster.end().date(),
                points: cluster.len(),
                folder: trip_dir,
                gpx: written.gpx,
                html: written.html,
            };
            info!("[Batch] Created trip {} with {} points", entry.name, entry.points);
            summary.trips.push(entry);
        }
    }

    write_indexes(&summary.trips, out_dir)?;
    info!(
        "[Batch] Created {} trips from {} folders in {}",
        summary.trips.len(),
        summary.folders_processed,
        out_dir.display()
    );
    Ok(summary)
}

// ============================================================================
// Index pages
// ============================================================================

const INDEX_STYLE: &str = r#"  <style>
    body { font-family: Arial, sans-serif; margin: 20px; }
    h1 { color: #2c3e50; }
    h2 { color: #3498db; margin-top: 30px; }
    .trip-list { display: flex; flex-wrap: wrap; }
    .trip-card { border: 1px solid #ddd; border-radius: 8px; padding: 15px; margin: 10px;
                 width: 300px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }
    .trip-card h3 { margin-top: 0; color: #3498db; }
    .trip-card p { color: #555; }
    .trip-card a, .year-link { display: inline-block; background-color: #3498db; color: white;
                 padding: 8px 12px; text-decoration: none; border-radius: 4px; margin: 10px 5px 0 0; }
    .year-link { background-color: #2c3e50; }
  </style>
"#;

fn group_by_year(trips: &[TripEntry]) -> BTreeMap<i32, Vec<&TripEntry>> {
    let mut years: BTreeMap<i32, Vec<&TripEntry>> = BTreeMap::new();
    for trip in trips {
        years.entry(trip.year).or_default().push(trip);
    }
    for list in years.values_mut() {
        list.sort_by_key(|t| t.start_date);
    }
    years
}

/// Path of a trip file relative to a page `depth` folders below the archive root.
fn relative_link(trip: &TripEntry, file: &Path, depth: usize) -> String {
    let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{}{}/{}", "../".repeat(depth), trip.name, file_name)
}

fn trip_card(trip: &TripEntry, title: &str, depth: usize) -> String {
    format!(
        r#"    <div class="trip-card">
      <h3>{}</h3>
      <p><strong>Dates:</strong> {}</p>
      <p><strong>Photos:</strong> {}</p>
      <a href="{}" target="_blank">View Map</a>
      <a href="{}" download>Download GPX</a>
    </div>
"#,
        escape_xml(title),
        trip.date_label(),
        trip.points,
        escape_xml(&relative_link(trip, &trip.html, depth)),
        escape_xml(&relative_link(trip, &trip.gpx, depth)),
    )
}

/// Render the index page for one year.
pub fn render_year_index(year: i32, trips: &[&TripEntry]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str(&format!("  <title>Trips from {}</title>\n", year));
    html.push_str(INDEX_STYLE);
    html.push_str("</head>\n<body>\n");
    html.push_str("  <p><a href=\"../index.html\">&larr; Back to all years</a></p>\n");
    html.push_str(&format!("  <h1>Trips from {}</h1>\n  <div class=\"trip-list\">\n", year));
    for trip in trips {
        html.push_str(&trip_card(trip, &trip.name, 1));
    }
    html.push_str("  </div>\n</body>\n</html>\n");
    html
}

/// Render the master index, most recent year first.
pub fn render_master_index(trips: &[TripEntry]) -> String {
    let years = group_by_year(trips);
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n  <title>Photo Trip Explorer</title>\n");
    html.push_str(INDEX_STYLE);
    html.push_str("</head>\n<body>\n  <h1>Photo Trip Explorer</h1>\n  <h2>Years</h2>\n  <div>\n");
    for year in years.keys().rev() {
        html.push_str(&format!("    <a href=\"#{0}\" class=\"year-link\">{0}</a>\n", year));
    }
    html.push_str("  </div>\n");

    for (year, list) in years.iter().rev() {
        html.push_str(&format!("  <section id=\"{0}\">\n  <h2>{0}</h2>\n", year));
        html.push_str(&format!("  <p><a href=\"{0}/index.html\">View all trips from {0}</a></p>\n", year));
        html.push_str("  <div class=\"trip-list\">\n");
        for trip in list {
            html.push_str(&trip_card(trip, trip.display_name(), 0));
        }
        html.push_str("  </div>\n  </section>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// Write `<year>/index.html` for every year plus the master `index.html`.
pub fn write_indexes(trips: &[TripEntry], out_dir: &Path) -> Result<()> {
    for (year, list) in group_by_year(trips) {
        let year_dir = out_dir.join(year.to_string());
        fs::create_dir_all(&year_dir)?;
        fs::write(year_dir.join("index.html"), render_year_index(year, &list))?;
    }
    fs::write(out_dir.join("index.html"), render_master_index(trips)).map_err(TripError::from)
}
