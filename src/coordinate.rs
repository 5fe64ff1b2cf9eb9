//! Coordinate resolution from GPS metadata.

use crate::metadata::{GpsMetadata, MediaMetadata, Rational};
use crate::GpsPoint;

/// Convert a degrees/minutes/seconds triple to signed decimal degrees.
///
/// South and west references are negative. Returns `None` for a missing
/// reference or a zero denominator.
///
/// ```
/// use photo_trip::{dms_to_decimal, Rational};
///
/// let dms = [Rational::new(48, 1), Rational::new(51, 1), Rational::new(2376, 100)];
/// let lat = dms_to_decimal(&dms, 'N').unwrap();
/// assert!((lat - 48.8566).abs() < 1e-4);
/// ```
pub fn dms_to_decimal(dms: &[Rational; 3], reference: char) -> Option<f64> {
    let degrees = dms[0].to_f64()?;
    let minutes = dms[1].to_f64()?;
    let seconds = dms[2].to_f64()?;
    let value = degrees + minutes / 60.0 + seconds / 3600.0;

    match reference.to_ascii_uppercase() {
        'N' | 'E' => Some(value),
        'S' | 'W' => Some(-value),
        _ => None,
    }
}

/// Resolve a coordinate and altitude from photo metadata.
///
/// Both outputs are `None` when GPS data is absent or malformed; a valid
/// altitude without a valid position is discarded too.
pub fn resolve_coordinate(meta: &MediaMetadata) -> (Option<GpsPoint>, Option<f64>) {
    let Some(gps) = meta.gps.as_ref() else {
        return (None, None);
    };
    match decode_point(gps) {
        Some(point) => (Some(point), decode_altitude(gps)),
        None => (None, None),
    }
}

fn decode_point(gps: &GpsMetadata) -> Option<GpsPoint> {
    let lat = dms_to_decimal(gps.latitude.as_ref()?, gps.latitude_ref?)?;
    let lon = dms_to_decimal(gps.longitude.as_ref()?, gps.longitude_ref?)?;
    let point = GpsPoint::new(lat, lon);
    point.is_valid().then_some(point)
}

fn decode_altitude(gps: &GpsMetadata) -> Option<f64> {
    let meters = gps.altitude?.to_f64()?;
    Some(if gps.altitude_below_sea_level { -meters } else { meters })
}
