//! Geocoding capability interface.
//!
//! Inference and the exporters only talk to a [`Geocoder`], so tests can run
//! against [`StaticGeocoder`] while the CLI plugs in the Nominatim client.
//! Every failure degrades to `None`; nothing here returns an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::GpsPoint;

/// Forward and reverse geocoding.
///
/// Implementations talking to a shared external service must space their
/// requests at least one second apart, across all threads.
pub trait Geocoder: Send + Sync {
    /// Place name → coordinate.
    fn forward(&self, name: &str) -> Option<GpsPoint>;

    /// Coordinate → display address.
    fn reverse(&self, point: &GpsPoint) -> Option<String>;
}

/// Geocoder that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    fn forward(&self, _name: &str) -> Option<GpsPoint> {
        None
    }

    fn reverse(&self, _point: &GpsPoint) -> Option<String> {
        None
    }
}

/// In-memory geocoder.
///
/// Forward lookups are case-insensitive. Reverse lookups return the address
/// of the nearest registered place within `reverse_radius_m`. Call counts
/// are tracked so callers can assert how often the service was hit.
#[derive(Debug, Default)]
pub struct StaticGeocoder {
    places: HashMap<String, GpsPoint>,
    addresses: Vec<(GpsPoint, String)>,
    reverse_radius_m: f64,
    forward_calls: AtomicU32,
    reverse_calls: AtomicU32,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self { reverse_radius_m: 5_000.0, ..Default::default() }
    }

    /// Register a place name for forward lookups.
    pub fn with_place(mut self, name: &str, point: GpsPoint) -> Self {
        self.places.insert(name.to_lowercase(), point);
        self
    }

    /// Register an address for reverse lookups.
    pub fn with_address(mut self, point: GpsPoint, address: &str) -> Self {
        self.addresses.push((point, address.to_string()));
        self
    }

    pub fn with_reverse_radius(mut self, meters: f64) -> Self {
        self.reverse_radius_m = meters;
        self
    }

    pub fn forward_calls(&self) -> u32 {
        self.forward_calls.load(Ordering::Relaxed)
    }

    pub fn reverse_calls(&self) -> u32 {
        self.reverse_calls.load(Ordering::Relaxed)
    }
}

impl Geocoder for StaticGeocoder {
    fn forward(&self, name: &str) -> Option<GpsPoint> {
        self.forward_calls.fetch_add(1, Ordering::Relaxed);
        self.places.get(&name.trim().to_lowercase()).copied()
    }

    fn reverse(&self, point: &GpsPoint) -> Option<String> {
        self.reverse_calls.fetch_add(1, Ordering::Relaxed);
        self.addresses
            .iter()
            .map(|(p, addr)| (crate::geo_utils::haversine_distance(p, point), addr))
            .filter(|(d, _)| *d <= self.reverse_radius_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, addr)| addr.clone())
    }
}

/// Memoizing wrapper for one export run.
///
/// Reverse lookups are keyed by the coordinate rounded to five decimals, so
/// the summary and CSV exporters share a single lookup per distinct point.
pub struct MemoGeocoder<'a> {
    inner: &'a dyn Geocoder,
    reverse_memo: Mutex<HashMap<(i64, i64), Option<String>>>,
}

impl<'a> MemoGeocoder<'a> {
    pub fn new(inner: &'a dyn Geocoder) -> Self {
        Self { inner, reverse_memo: Mutex::new(HashMap::new()) }
    }
}

impl Geocoder for MemoGeocoder<'_> {
    fn forward(&self, name: &str) -> Option<GpsPoint> {
        self.inner.forward(name)
    }

    fn reverse(&self, point: &GpsPoint) -> Option<String> {
        let key = (
            (point.latitude * 1e5).round() as i64,
            (point.longitude * 1e5).round() as i64,
        );
        if let Ok(memo) = self.reverse_memo.lock() {
            if let Some(hit) = memo.get(&key) {
                return hit.clone();
            }
        }
        let address = self.inner.reverse(point);
        if let Ok(mut memo) = self.reverse_memo.lock() {
            memo.insert(key, address.clone());
        }
        address
    }
}

/// Short place label from a full display address.
///
/// Takes the third component from the end (typically the city in
/// "street, city, region, postcode, country" layouts), or the first component
/// for short addresses.
///
/// ```
/// use photo_trip::geocode::short_place_name;
///
/// let addr = "Piazza Navona, Rome, Roma Capitale, Lazio, 00186, Italy";
/// assert_eq!(short_place_name(addr), "Lazio");
/// assert_eq!(short_place_name("Paris, France"), "Paris");
/// ```
pub fn short_place_name(address: &str) -> String {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    if parts.len() >= 3 {
        parts[parts.len() - 3].to_string()
    } else {
        parts.first().map(|s| s.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_forward() {
        let geocoder = StaticGeocoder::new().with_place("Rome", GpsPoint::new(41.9, 12.5));
        assert_eq!(geocoder.forward("rome"), Some(GpsPoint::new(41.9, 12.5)));
        assert_eq!(geocoder.forward("Atlantis"), None);
        assert_eq!(geocoder.forward_calls(), 2);
    }

    #[test]
    fn test_static_reverse_nearest_within_radius() {
        let geocoder = StaticGeocoder::new()
            .with_address(GpsPoint::new(48.8566, 2.3522), "Paris, France")
            .with_address(GpsPoint::new(48.2082, 16.3738), "Vienna, Austria");

        assert_eq!(geocoder.reverse(&GpsPoint::new(48.86, 2.35)).as_deref(), Some("Paris, France"));
        assert_eq!(geocoder.reverse(&GpsPoint::new(0.0, 0.0)), None);
        assert_eq!(geocoder.reverse_calls(), 2);
    }

    #[test]
    fn test_memo_reuses_reverse_lookups() {
        let inner = StaticGeocoder::new().with_address(GpsPoint::new(48.8566, 2.3522), "Paris, France");
        let memo = MemoGeocoder::new(&inner);
        let paris = GpsPoint::new(48.8566, 2.3522);
        assert_eq!(memo.reverse(&paris).as_deref(), Some("Paris, France"));
        assert_eq!(memo.reverse(&paris).as_deref(), Some("Paris, France"));
        assert_eq!(memo.reverse(&GpsPoint::new(0.0, 0.0)), None);
        assert_eq!(memo.reverse(&GpsPoint::new(0.0, 0.0)), None);
        assert_eq!(inner.reverse_calls(), 2);
    }

    #[test]
    fn test_no_geocoder() {
        assert!(NoGeocoder.forward("Rome").is_none());
        assert!(NoGeocoder.reverse(&GpsPoint::new(0.0, 0.0)).is_none());
    }
}
