//! Custom routes built from a list of place names.
//!
//! Useful when a trip has no GPS data at all: the route is written as GPX
//! and can then be imported as the reference track for photo inference.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use log::{info, warn};
use serde::Deserialize;

use crate::error::{Result, TripError};
use crate::geocode::Geocoder;
use crate::{GpsPoint, SourceRef, TripPoint};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One requested stop of a custom route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStop {
    pub name: String,
    /// Explicit visit date; defaults to `start + index` days
    pub date: Option<NaiveDate>,
}

impl RouteStop {
    /// Pair names with dates by position; extra names get no explicit date.
    pub fn from_names(names: &[String], dates: &[NaiveDate]) -> Vec<RouteStop> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| RouteStop { name: name.clone(), date: dates.get(i).copied() })
            .collect()
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| TripError::InvalidDate {
        input: input.to_string(),
        expected: "YYYY-MM-DD".to_string(),
    })
}

/// Parse route dates, skipping (and logging) malformed entries.
pub fn parse_route_dates(inputs: &[String]) -> Vec<NaiveDate> {
    inputs
        .iter()
        .filter_map(|s| match parse_date(s) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("[Route] {}, ignoring this date", e);
                None
            }
        })
        .collect()
}

/// Resolve stops to timed route points.
///
/// Coordinates come from `custom_locations` first, then the geocoder.
/// Unresolvable stops are skipped; their index still counts towards the
/// default `start + index` date of later stops.
pub fn build_route(
    stops: &[RouteStop],
    start_date: NaiveDate,
    custom_locations: &HashMap<String, GpsPoint>,
    geocoder: &dyn Geocoder,
) -> Vec<TripPoint> {
    let mut points = Vec::with_capacity(stops.len());

    for (i, stop) in stops.iter().enumerate() {
        let point = match custom_locations.get(&stop.name) {
            Some(p) => {
                info!("[Route] {}: using custom coordinates", stop.name);
                Some(*p)
            }
            None => geocoder.forward(&stop.name),
        };
        let Some(point) = point else {
            warn!("[Route] Could not find coordinates for {}", stop.name);
            continue;
        };

        let date = stop.date.unwrap_or(start_date + Duration::days(i as i64));
        let timestamp = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        info!(
            "[Route] Added {}: {:.5}, {:.5} on {}",
            stop.name,
            point.latitude,
            point.longitude,
            date.format(DATE_FORMAT)
        );
        points.push(
            TripPoint::new(timestamp, point).with_source(SourceRef::Waypoint(stop.name.clone())),
        );
    }

    points
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CustomCoordinate {
    Pair([f64; 2]),
    Object { lat: f64, lon: f64 },
}

/// Load a `{ "name": [lat, lon] }` file; `{ "lat", "lon" }` objects are
/// accepted as values too.
pub fn load_custom_locations(path: &Path) -> Result<HashMap<String, GpsPoint>> {
    let text = fs::read_to_string(path)?;
    let raw: HashMap<String, CustomCoordinate> = serde_json::from_str(&text)?;
    let locations: HashMap<String, GpsPoint> = raw
        .into_iter()
        .map(|(name, c)| {
            let point = match c {
                CustomCoordinate::Pair([lat, lon]) => GpsPoint::new(lat, lon),
                CustomCoordinate::Object { lat, lon } => GpsPoint::new(lat, lon),
            };
            (name, point)
        })
        .filter(|(name, p)| {
            let ok = p.is_valid();
            if !ok {
                warn!("[Route] Ignoring out-of-range custom location '{}'", name);
            }
            ok
        })
        .collect();
    info!("[Route] Loaded {} custom locations from {}", locations.len(), path.display());
    Ok(locations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::StaticGeocoder;
    use tempfile::tempdir;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, day).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_explicit_dates_win_then_start_plus_index() {
        let geocoder = StaticGeocoder::new()
            .with_place("Rome", GpsPoint::new(41.9, 12.5))
            .with_place("Florence", GpsPoint::new(43.77, 11.25))
            .with_place("Venice", GpsPoint::new(45.44, 12.33));
        let stops = RouteStop::from_names(&names(&["Rome", "Florence", "Venice"]), &[d(7, 1)]);

        let route = build_route(&stops, d(6, 10), &HashMap::new(), &geocoder);
        let dates: Vec<NaiveDate> = route.iter().map(|p| p.timestamp.date()).collect();
        assert_eq!(dates, vec![d(7, 1), d(6, 11), d(6, 12)]);
        assert_eq!(route[2].display_name(), "Venice");
    }

    #[test]
    fn test_unknown_names_skipped_custom_first() {
        let geocoder = StaticGeocoder::new().with_place("Rome", GpsPoint::new(41.9, 12.5));
        let mut custom = HashMap::new();
        custom.insert("Rome".to_string(), GpsPoint::new(1.0, 1.0));

        let stops = RouteStop::from_names(&names(&["Atlantis", "Rome"]), &[]);
        let route = build_route(&stops, d(6, 10), &custom, &geocoder);
        assert_eq!(route.len(), 1);
        assert_eq!(route[0].point, GpsPoint::new(1.0, 1.0));
        assert_eq!(route[0].timestamp.date(), d(6, 11));
        assert_eq!(geocoder.forward_calls(), 1);
    }

    #[test]
    fn test_parse_route_dates_skips_bad() {
        let parsed = parse_route_dates(&names(&["2023-06-01", "June 2nd", "2023-06-03"]));
        assert_eq!(parsed, vec![d(6, 1), d(6, 3)]);
        assert!(matches!(parse_date("x"), Err(TripError::InvalidDate { .. })));
    }

    #[test]
    fn test_load_custom_locations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(
            &path,
            r#"{"Hidden Beach": [36.5, -4.9], "Hut": {"lat": 46.1, "lon": 7.6}, "Bad": [100.0, 0.0]}"#,
        )
        .unwrap();

        let locations = load_custom_locations(&path).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations["Hidden Beach"], GpsPoint::new(36.5, -4.9));
        assert_eq!(locations["Hut"], GpsPoint::new(46.1, 7.6));

        fs::write(&path, "[]").unwrap();
        assert!(load_custom_locations(&path).is_err());
    }
}
