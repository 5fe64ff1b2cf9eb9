//! Media metadata interface.
//!
//! Binary metadata parsing is delegated to a [`MetadataReader`]. The resolvers
//! in [`crate::timestamp`] and [`crate::coordinate`] only see the decoded
//! fields below, so they can be driven from tests without image files.

use std::path::Path;

/// An unsigned EXIF rational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub denom: u32,
}

impl Rational {
    pub fn new(num: u32, denom: u32) -> Self {
        Self { num, denom }
    }

    /// Decimal value, or `None` for a zero denominator.
    pub fn to_f64(self) -> Option<f64> {
        if self.denom == 0 {
            return None;
        }
        Some(self.num as f64 / self.denom as f64)
    }
}

/// Raw GPS fields as stored in the GPS IFD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsMetadata {
    /// Degrees, minutes, seconds
    pub latitude: Option<[Rational; 3]>,
    /// 'N' or 'S'
    pub latitude_ref: Option<char>,
    pub longitude: Option<[Rational; 3]>,
    /// 'E' or 'W'
    pub longitude_ref: Option<char>,
    /// Meters
    pub altitude: Option<Rational>,
    /// GPSAltitudeRef == 1
    pub altitude_below_sea_level: bool,
}

/// The subset of photo metadata the resolvers consume.
///
/// Date fields hold the raw EXIF strings (`YYYY:MM:DD HH:MM:SS`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaMetadata {
    pub date_time_original: Option<String>,
    pub date_time: Option<String>,
    pub date_time_digitized: Option<String>,
    pub gps: Option<GpsMetadata>,
}

/// Decodes metadata from a media file.
///
/// Returns `None` when the file has no readable metadata. Implementations
/// must not panic on malformed input.
pub trait MetadataReader: Send + Sync {
    fn read(&self, path: &Path) -> Option<MediaMetadata>;
}

/// Reader that never finds metadata; resolution falls back to filenames and
/// filesystem times.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataReader for NoMetadata {
    fn read(&self, _path: &Path) -> Option<MediaMetadata> {
        None
    }
}

/// EXIF reader backed by `kamadak-exif`.
#[cfg(feature = "exif")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

#[cfg(feature = "exif")]
impl MetadataReader for ExifReader {
    fn read(&self, path: &Path) -> Option<MediaMetadata> {
        use exif::{In, Tag};
        use log::debug;
        use std::fs::File;
        use std::io::BufReader;

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("[ExifReader] Cannot open {}: {}", path.display(), e);
                return None;
            }
        };
        let mut reader = BufReader::new(file);
        let data = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(d) => d,
            Err(e) => {
                debug!("[ExifReader] No EXIF in {}: {}", path.display(), e);
                return None;
            }
        };

        let ascii = |tag: Tag| -> Option<String> {
            match &data.get_field(tag, In::PRIMARY)?.value {
                exif::Value::Ascii(parts) => parts
                    .first()
                    .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
                    .filter(|s| !s.is_empty()),
                _ => None,
            }
        };
        let rationals = |tag: Tag| -> Option<Vec<Rational>> {
            match &data.get_field(tag, In::PRIMARY)?.value {
                exif::Value::Rational(values) => Some(
                    values.iter().map(|r| Rational::new(r.num, r.denom)).collect(),
                ),
                _ => None,
            }
        };
        let dms = |tag: Tag| -> Option<[Rational; 3]> {
            let values = rationals(tag)?;
            match values.as_slice() {
                [d, m, s, ..] => Some([*d, *m, *s]),
                _ => None,
            }
        };
        let reference = |tag: Tag| ascii(tag).and_then(|s| s.chars().next());

        let latitude = dms(Tag::GPSLatitude);
        let longitude = dms(Tag::GPSLongitude);
        let gps = if latitude.is_some() || longitude.is_some() {
            let below_sea_level = match data.get_field(Tag::GPSAltitudeRef, In::PRIMARY) {
                Some(field) => matches!(&field.value, exif::Value::Byte(b) if b.first() == Some(&1)),
                None => false,
            };
            Some(GpsMetadata {
                latitude,
                latitude_ref: reference(Tag::GPSLatitudeRef),
                longitude,
                longitude_ref: reference(Tag::GPSLongitudeRef),
                altitude: rationals(Tag::GPSAltitude).and_then(|v| v.first().copied()),
                altitude_below_sea_level: below_sea_level,
            })
        } else {
            None
        };

        Some(MediaMetadata {
            date_time_original: ascii(Tag::DateTimeOriginal),
            date_time: ascii(Tag::DateTime),
            date_time_digitized: ascii(Tag::DateTimeDigitized),
            gps,
        })
    }
}
