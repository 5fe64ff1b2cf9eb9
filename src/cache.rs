//! # Location Cache
//!
//! Durable key → coordinate mapping stored per scanned root at
//! `<root>/Route/location_cache.json`:
//!
//! ```json
//! {
//!   "Rome/IMG_0001.jpg": { "lat": 41.89, "lon": 12.49 },
//!   "Rome": { "lat": 41.89, "lon": 12.49 }
//! }
//! ```
//!
//! Keys are paths relative to the root, either per file or per folder. The
//! cache is a value: inference takes a snapshot and returns an updated one,
//! and persistence happens once per run through [`LocationCache::save`].
//!
//! One writer per root. Concurrent runs against the same root are not
//! supported; batch mode gives every root its own file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::GpsPoint;

/// Output folder created inside each scanned root.
pub const ROUTE_DIR: &str = "Route";

/// Cache file name inside [`ROUTE_DIR`].
pub const CACHE_FILE: &str = "location_cache.json";

/// A cached coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedLocation {
    pub lat: f64,
    pub lon: f64,
}

impl CachedLocation {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.lat, self.lon)
    }
}

impl From<GpsPoint> for CachedLocation {
    fn from(p: GpsPoint) -> Self {
        Self { lat: p.latitude, lon: p.longitude }
    }
}

/// In-memory snapshot of a root's location cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationCache {
    entries: BTreeMap<String, CachedLocation>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the cache file for a root.
    pub fn cache_path(root: &Path) -> PathBuf {
        root.join(ROUTE_DIR).join(CACHE_FILE)
    }

    /// Load the cache for `root`.
    ///
    /// A missing file yields an empty cache. An unreadable or corrupt file is
    /// logged and also yields an empty cache; individual malformed entries are
    /// skipped.
    pub fn load(root: &Path) -> Self {
        let path = Self::cache_path(root);
        if !path.exists() {
            debug!("[LocationCache] No cache at {}", path.display());
            return Self::default();
        }

        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                warn!("[LocationCache] Cannot read {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let raw: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&text) {
            Ok(map) => map,
            Err(e) => {
                warn!("[LocationCache] Ignoring corrupt cache {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            match serde_json::from_value::<CachedLocation>(value) {
                Ok(loc) if loc.point().is_valid() => {
                    entries.insert(key, loc);
                }
                _ => warn!("[LocationCache] Skipping malformed entry '{}'", key),
            }
        }

        info!("[LocationCache] Loaded {} entries from {}", entries.len(), path.display());
        Self { entries }
    }

    /// Persist the cache for `root`.
    ///
    /// Writes a sibling temp file and renames it over the target, so readers
    /// never observe a partially written cache.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::cache_path(root);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        info!("[LocationCache] Saved {} entries to {}", self.entries.len(), path.display());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<CachedLocation> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite a key.
    pub fn insert(&mut self, key: impl Into<String>, point: GpsPoint) {
        self.entries.insert(key.into(), point.into());
    }

    /// Look up a photo, preferring its per-file key over its folder key.
    pub fn lookup(&self, file_key: &str, folder_key: &str) -> Option<CachedLocation> {
        self.get(file_key).or_else(|| self.get(folder_key))
    }

    /// Copy all entries of `other` into this cache, overwriting on conflict.
    pub fn merge(&mut self, other: &LocationCache) {
        for (key, loc) in &other.entries {
            self.entries.insert(key.clone(), *loc);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CachedLocation)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Cache key for a file: its path relative to `root`.
///
/// Paths outside the root keep their full form.
pub fn file_key(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Cache key for a folder: its path relative to `root`, `"."` for the root.
pub fn folder_key(root: &Path, folder: &Path) -> String {
    let key = file_key(root, folder);
    if key.is_empty() {
        ".".to_string()
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mut cache = LocationCache::new();
        cache.insert("Rome/IMG_0001.jpg", GpsPoint::new(41.89, 12.49));
        cache.insert("Rome", GpsPoint::new(41.9, 12.5));
        cache.save(dir.path()).unwrap();

        let loaded = LocationCache::load(dir.path());
        assert_eq!(loaded, cache);
        assert!(!LocationCache::cache_path(dir.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let dir = tempdir().unwrap();
        assert!(LocationCache::load(dir.path()).is_empty());

        fs::create_dir_all(dir.path().join(ROUTE_DIR)).unwrap();
        fs::write(LocationCache::cache_path(dir.path()), "{ not json").unwrap();
        assert!(LocationCache::load(dir.path()).is_empty());

        fs::write(LocationCache::cache_path(dir.path()), "[1, 2, 3]").unwrap();
        assert!(LocationCache::load(dir.path()).is_empty());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(ROUTE_DIR)).unwrap();
        fs::write(
            LocationCache::cache_path(dir.path()),
            r#"{"a.jpg": {"lat": 1.0, "lon": 2.0}, "b.jpg": "oops", "c.jpg": {"lat": 95.0, "lon": 0.0}}"#,
        )
        .unwrap();

        let cache = LocationCache::load(dir.path());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.jpg"), Some(CachedLocation { lat: 1.0, lon: 2.0 }));
    }

    #[test]
    fn test_lookup_prefers_file_key() {
        let mut cache = LocationCache::new();
        cache.insert("Rome", GpsPoint::new(41.9, 12.5));
        assert_eq!(cache.lookup("Rome/a.jpg", "Rome").unwrap().lat, 41.9);

        cache.insert("Rome/a.jpg", GpsPoint::new(41.8, 12.4));
        assert_eq!(cache.lookup("Rome/a.jpg", "Rome").unwrap().lat, 41.8);
    }

    #[test]
    fn test_keys() {
        let root = Path::new("/photos");
        assert_eq!(
            file_key(root, Path::new("/photos/Rome/a.jpg")),
            Path::new("Rome").join("a.jpg").to_string_lossy()
        );
        assert_eq!(folder_key(root, Path::new("/photos")), ".");
        assert_eq!(folder_key(root, Path::new("/photos/Rome")), "Rome");
        assert_eq!(file_key(root, Path::new("/elsewhere/b.jpg")), "/elsewhere/b.jpg");
    }
}
