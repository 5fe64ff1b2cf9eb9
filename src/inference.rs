//! # Location Inference
//!
//! Fills in coordinates for photos that carry no GPS data.
//!
//! ## Stage A: temporal interpolation
//! Each unpositioned item is placed between its nearest positioned neighbours
//! in time (`before` at or earlier, `after` at or later):
//! - both found: linear blend of latitude and longitude by the time ratio
//!   `(t - t_before) / (t_after - t_before)`, or `before` when the two share a
//!   timestamp
//! - only one found: that neighbour's coordinate
//! - neither: the item moves on to stage B
//!
//! Interpolated items are written to the cache under their per-file key.
//!
//! ## Stage B: contextual geocoding
//! Remaining items are grouped by containing folder. A cached per-file key
//! wins, then the folder key; otherwise the folder path yields a place-name
//! hint which is geocoded once for the whole group and cached under the
//! folder key. Groups that cannot be resolved stay unpositioned.
//!
//! Both stages work on a cache snapshot and return the updated snapshot; the
//! caller persists it once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::{file_key, folder_key, LocationCache};
use crate::error::{Result, TripError};
use crate::geocode::Geocoder;
use crate::{GpsPoint, Item, PositionOrigin, TripPoint};

// ============================================================================
// Folder-name hints
// ============================================================================

/// Configuration for deriving place names from folder paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintConfig {
    /// Folder names that never describe a place (compared case-insensitively)
    pub generic_folders: Vec<String>,
    /// Regex prefixes stripped from the start of a segment (case-insensitive)
    pub strip_prefixes: Vec<String>,
    /// Segments shorter than this after stripping are ignored
    pub min_length: usize,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            generic_folders: [
                "pictures", "photos", "images", "camera", "dcim", "iphone", "android", "backup",
                "desktop",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            strip_prefixes: vec![
                r"\d{4}_".to_string(),       // 2023_
                r"\d{2}_\d{2}_".to_string(), // 06_15_
                "Vacation_".to_string(),
                "Trip_".to_string(),
            ],
            min_length: 4,
        }
    }
}

/// Compiled folder-name hinter.
#[derive(Debug, Clone)]
pub struct LocationHinter {
    generic: Vec<String>,
    strip: Option<Regex>,
    min_length: usize,
}

impl LocationHinter {
    pub fn new(config: &HintConfig) -> Result<Self> {
        let strip = if config.strip_prefixes.is_empty() {
            None
        } else {
            let pattern = format!("(?i)^(?:{})", config.strip_prefixes.join("|"));
            Some(Regex::new(&pattern).map_err(|e| TripError::InvalidPattern {
                pattern,
                reason: e.to_string(),
            })?)
        };

        Ok(Self {
            generic: config.generic_folders.iter().map(|s| s.to_lowercase()).collect(),
            strip,
            min_length: config.min_length,
        })
    }

    /// Most specific path segment that looks like a place name.
    ///
    /// ```
    /// use photo_trip::{HintConfig, LocationHinter};
    /// use std::path::Path;
    ///
    /// let hinter = LocationHinter::new(&HintConfig::default()).unwrap();
    /// assert_eq!(hinter.hint_for(Path::new("/photos/2023_Rome/DCIM")).as_deref(), Some("Rome"));
    /// assert_eq!(hinter.hint_for(Path::new("Vacation_New_York")).as_deref(), Some("New York"));
    /// ```
    pub fn hint_for(&self, folder: &Path) -> Option<String> {
        folder
            .iter()
            .rev()
            .map(|segment| segment.to_string_lossy())
            .find_map(|segment| self.clean(&segment))
    }

    fn clean(&self, segment: &str) -> Option<String> {
        let cleaned = match &self.strip {
            Some(re) => re.replace(segment, "").into_owned(),
            None => segment.to_string(),
        };
        if cleaned.chars().count() < self.min_length {
            return None;
        }
        if self.generic.contains(&cleaned.to_lowercase()) {
            return None;
        }
        Some(cleaned.replace('_', " "))
    }
}

// ============================================================================
// Stage A: interpolation
// ============================================================================

/// Positioned timeline used for interpolation, sorted by time.
#[derive(Debug, Clone, Default)]
pub struct KnownPositions {
    entries: Vec<(NaiveDateTime, GpsPoint)>,
}

impl KnownPositions {
    /// Build from positioned points in any order.
    ///
    /// Points sharing a timestamp keep their input order; the first of them
    /// is the one used as a neighbour.
    pub fn from_points(points: &[TripPoint]) -> Self {
        let mut entries: Vec<(NaiveDateTime, GpsPoint)> =
            points.iter().map(|p| (p.timestamp, p.point)).collect();
        entries.sort_by_key(|e| e.0);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nearest entry at or before `t`.
    fn before(&self, t: NaiveDateTime) -> Option<(NaiveDateTime, GpsPoint)> {
        let end = self.entries.partition_point(|e| e.0 <= t);
        let latest = self.entries.get(end.checked_sub(1)?)?.0;
        let first = self.entries.partition_point(|e| e.0 < latest);
        self.entries.get(first).copied()
    }

    /// Nearest entry at or after `t`.
    fn after(&self, t: NaiveDateTime) -> Option<(NaiveDateTime, GpsPoint)> {
        let idx = self.entries.partition_point(|e| e.0 < t);
        self.entries.get(idx).copied()
    }
}

/// Estimate a coordinate at time `t`.
///
/// ```
/// use chrono::NaiveDate;
/// use photo_trip::{interpolate, GpsPoint, KnownPositions, TripPoint};
///
/// let day = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
/// let known = KnownPositions::from_points(&[
///     TripPoint::new(day.and_hms_opt(10, 0, 0).unwrap(), GpsPoint::new(48.0, 2.0)),
///     TripPoint::new(day.and_hms_opt(14, 0, 0).unwrap(), GpsPoint::new(49.0, 3.0)),
/// ]);
/// let noon = interpolate(day.and_hms_opt(12, 0, 0).unwrap(), &known).unwrap();
/// assert_eq!(noon, GpsPoint::new(48.5, 2.5));
/// ```
pub fn interpolate(t: NaiveDateTime, known: &KnownPositions) -> Option<GpsPoint> {
    match (known.before(t), known.after(t)) {
        (Some((tb, pb)), Some((ta, pa))) => {
            if ta == tb {
                return Some(pb);
            }
            let span = (ta - tb).num_milliseconds() as f64;
            let offset = (t - tb).num_milliseconds() as f64;
            let ratio = offset / span;
            Some(GpsPoint::new(
                pb.latitude + ratio * (pa.latitude - pb.latitude),
                pb.longitude + ratio * (pa.longitude - pb.longitude),
            ))
        }
        (Some((_, pb)), None) => Some(pb),
        (None, Some((_, pa))) => Some(pa),
        (None, None) => None,
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Result of an inference run.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutcome {
    /// Items that received a coordinate
    pub located: Vec<TripPoint>,
    /// Items still without a coordinate
    pub unresolved: Vec<Item>,
    /// Updated cache snapshot
    pub cache: LocationCache,
}

/// Run stage A then stage B over `unpositioned`.
///
/// `positioned` are the interpolation anchors (photos with GPS, track
/// points). The geocoder is called at most once per folder group.
pub fn infer_locations(
    unpositioned: Vec<Item>,
    positioned: &[TripPoint],
    cache: LocationCache,
    root: &Path,
    hinter: &LocationHinter,
    geocoder: &dyn Geocoder,
) -> InferenceOutcome {
    let mut cache = cache;
    let mut located = Vec::with_capacity(unpositioned.len());
    let total = unpositioned.len();

    // Stage A
    let known = KnownPositions::from_points(positioned);
    let remaining: Vec<Item> = if known.is_empty() {
        unpositioned
    } else {
        let mut remaining = Vec::new();
        for item in unpositioned {
            match interpolate(item.timestamp, &known) {
                Some(point) => {
                    if let Some(path) = item.photo_path() {
                        cache.insert(file_key(root, path), point);
                    }
                    located.push(item.locate(point, PositionOrigin::Interpolated));
                }
                None => remaining.push(item),
            }
        }
        remaining
    };
    let interpolated = located.len();
    info!(
        "[Inference] Stage A: interpolated {}/{} items from {} known positions",
        interpolated,
        total,
        known.len()
    );

    // Stage B
    let (groups, mut unresolved) = group_by_folder(remaining);
    let mut lookups = 0;
    for (folder, items) in groups {
        let key = folder_key(root, &folder);
        let mut pending = Vec::new();

        for item in items {
            let cached = item.photo_path().and_then(|p| cache.get(&file_key(root, p)));
            match cached {
                Some(loc) => located.push(item.locate(loc.point(), PositionOrigin::Cached)),
                None => pending.push(item),
            }
        }
        if pending.is_empty() {
            continue;
        }

        let resolved = match cache.get(&key) {
            Some(loc) => {
                debug!("[Inference] Folder '{}' resolved from cache", key);
                Some((loc.point(), PositionOrigin::Cached))
            }
            None => match hinter.hint_for(&folder) {
                Some(hint) => {
                    lookups += 1;
                    match geocoder.forward(&hint) {
                        Some(point) => {
                            info!(
                                "[Inference] '{}' -> ({:.5}, {:.5}) for {} items",
                                hint,
                                point.latitude,
                                point.longitude,
                                pending.len()
                            );
                            cache.insert(key.clone(), point);
                            Some((point, PositionOrigin::Geocoded))
                        }
                        None => {
                            warn!("[Inference] Could not geocode '{}' (folder '{}')", hint, key);
                            None
                        }
                    }
                }
                None => {
                    debug!("[Inference] No place hint in folder '{}'", folder.display());
                    None
                }
            },
        };

        match resolved {
            Some((point, origin)) => {
                located.extend(pending.into_iter().map(|item| item.locate(point, origin)));
            }
            None => unresolved.extend(pending),
        }
    }

    info!(
        "[Inference] Stage B: located {} items ({} geocoder lookups), {} unresolved",
        located.len() - interpolated,
        lookups,
        unresolved.len()
    );

    InferenceOutcome { located, unresolved, cache }
}

/// Group photos by containing folder; items without a photo path are
/// returned separately.
fn group_by_folder(items: Vec<Item>) -> (Vec<(PathBuf, Vec<Item>)>, Vec<Item>) {
    let mut groups: BTreeMap<PathBuf, Vec<Item>> = BTreeMap::new();
    let mut orphans = Vec::new();

    for item in items {
        match item.photo_path().and_then(Path::parent).map(Path::to_path_buf) {
            Some(folder) => groups.entry(folder).or_default().push(item),
            None => orphans.push(item),
        }
    }

    (groups.into_iter().collect(), orphans)
}

// ============================================================================
// Manual assignment
// ============================================================================

/// A folder of unpositioned photos presented to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoGroup {
    pub folder: PathBuf,
    pub count: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    /// File name of one photo in the group
    pub example: String,
}

impl PhotoGroup {
    /// Folder display name (its last path segment).
    pub fn name(&self) -> String {
        self.folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.display().to_string())
    }
}

/// Source of user-typed place names.
pub trait LocationPrompt {
    /// Place name for the group, or `None` to skip it.
    fn ask(&mut self, group: &PhotoGroup) -> Option<String>;
}

impl<F> LocationPrompt for F
where
    F: FnMut(&PhotoGroup) -> Option<String>,
{
    fn ask(&mut self, group: &PhotoGroup) -> Option<String> {
        self(group)
    }
}

/// Ask for a place name per folder and geocode it.
///
/// Every photo of a resolved group is cached under its per-file key.
pub fn assign_manual_locations(
    unpositioned: Vec<Item>,
    cache: LocationCache,
    root: &Path,
    prompt: &mut dyn LocationPrompt,
    geocoder: &dyn Geocoder,
) -> InferenceOutcome {
    let mut cache = cache;
    let mut located = Vec::new();
    let (groups, mut unresolved) = group_by_folder(unpositioned);
    info!("[Inference] Manual mode: {} folders to label", groups.len());

    for (folder, items) in groups {
        let group = PhotoGroup {
            count: items.len(),
            first: items.iter().map(|i| i.timestamp).min().unwrap_or_default(),
            last: items.iter().map(|i| i.timestamp).max().unwrap_or_default(),
            example: items
                .first()
                .and_then(|i| i.photo_path())
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            folder,
        };

        let point = match prompt.ask(&group).map(|s| s.trim().to_string()) {
            Some(name) if !name.is_empty() => {
                let point = geocoder.forward(&name);
                if point.is_none() {
                    warn!("[Inference] Could not geocode '{}', skipping {}", name, group.name());
                }
                point
            }
            _ => {
                debug!("[Inference] Skipped folder {}", group.name());
                None
            }
        };

        match point {
            Some(point) => {
                for item in items {
                    if let Some(path) = item.photo_path() {
                        cache.insert(file_key(root, path), point);
                    }
                    located.push(item.locate(point, PositionOrigin::Manual));
                }
            }
            None => unresolved.extend(items),
        }
    }

    InferenceOutcome { located, unresolved, cache }
}
