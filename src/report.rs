//! Markdown summary and CSV export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use csv::Writer;
use log::info;

use crate::error::Result;
use crate::geocode::Geocoder;
use crate::segmentation::Cluster;
use crate::TripPoint;

/// Address shown when reverse geocoding was requested but found nothing.
const UNKNOWN_ADDRESS: &str = "Unknown";

pub const CSV_COLUMNS: [&str; 7] = ["Timestamp", "Title", "Latitude", "Longitude", "Altitude", "Filename", "Address"];

/// Altitude worth printing; a zero reading is treated as absent.
fn reported_altitude(point: &TripPoint) -> Option<f64> {
    point.altitude.filter(|a| *a != 0.0)
}

fn address_for(point: &TripPoint, geocoder: Option<&dyn Geocoder>) -> String {
    match geocoder {
        Some(g) => g.reverse(&point.point).unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
        None => String::new(),
    }
}

/// Write a Markdown summary, one section per segment.
///
/// ```text
/// # Trip Summary
///
/// ## Segment 1 - 2023-06-15
/// - 09:00 @ (48.85000,2.35000) [35.0m] Paris, France
/// ```
pub fn write_summary(clusters: &[Cluster], path: &Path, geocoder: Option<&dyn Geocoder>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "# Trip Summary")?;
    writeln!(writer)?;

    for (idx, cluster) in clusters.iter().enumerate() {
        writeln!(writer, "## Segment {} - {}", idx + 1, cluster.start().format("%Y-%m-%d"))?;
        for point in cluster.points() {
            let elevation = reported_altitude(point).map(|a| format!(" [{:.1}m]", a)).unwrap_or_default();
            let address = address_for(point, geocoder);
            let line = format!(
                "- {} @ ({:.5},{:.5}){} {}",
                point.timestamp.format("%H:%M"),
                point.point.latitude,
                point.point.longitude,
                elevation,
                address
            );
            writeln!(writer, "{}", line.trim_end())?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    info!("[Report] Wrote summary to {}", path.display());
    Ok(())
}

/// Write one CSV row per point.
pub fn write_csv(clusters: &[Cluster], path: &Path, geocoder: Option<&dyn Geocoder>) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(CSV_COLUMNS)?;

    let mut rows = 0;
    for (idx, cluster) in clusters.iter().enumerate() {
        let title = format!("Segment {}", idx + 1);
        for point in cluster.points() {
            writer.write_record([
                point.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                title.clone(),
                point.point.latitude.to_string(),
                point.point.longitude.to_string(),
                reported_altitude(point).map(|a| a.to_string()).unwrap_or_default(),
                point.display_name(),
                address_for(point, geocoder),
            ])?;
            rows += 1;
        }
    }

    writer.flush()?;
    info!("[Report] Wrote {} CSV rows to {}", rows, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::StaticGeocoder;
    use crate::segmentation::{segment, SegmentConfig};
    use crate::{GpsPoint, SourceRef};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn clusters() -> Vec<Cluster> {
        let day = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let points = vec![
            TripPoint::new(day.and_hms_opt(9, 0, 0).unwrap(), GpsPoint::new(48.85, 2.35))
                .with_altitude(Some(35.0))
                .with_source(SourceRef::File("/p/IMG_1.jpg".into())),
            TripPoint::new(day.and_hms_opt(14, 0, 0).unwrap(), GpsPoint::new(48.20, 16.37)),
        ];
        segment(points, &SegmentConfig::default())
    }

    #[test]
    fn test_summary_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip.md");
        write_summary(&clusters(), &path, None).unwrap();

        let md = fs::read_to_string(&path).unwrap();
        assert!(md.starts_with("# Trip Summary\n\n## Segment 1 - 2023-06-15\n"));
        assert!(md.contains("- 09:00 @ (48.85000,2.35000) [35.0m]\n"));
        assert!(md.contains("## Segment 2 - 2023-06-15\n- 14:00 @ (48.20000,16.37000)\n"));
    }

    #[test]
    fn test_summary_with_addresses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip.md");
        let geocoder = StaticGeocoder::new().with_address(GpsPoint::new(48.85, 2.35), "Paris, France");
        write_summary(&clusters(), &path, Some(&geocoder)).unwrap();

        let md = fs::read_to_string(&path).unwrap();
        assert!(md.contains("[35.0m] Paris, France"));
        assert!(md.contains("(48.20000,16.37000) Unknown"));
    }

    #[test]
    fn test_csv_rows_and_quoting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip.csv");
        let geocoder = StaticGeocoder::new().with_address(GpsPoint::new(48.85, 2.35), "Paris, France");
        write_csv(&clusters(), &path, Some(&geocoder)).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_COLUMNS.join(","));
        assert_eq!(lines[1], "2023-06-15 09:00:00,Segment 1,48.85,2.35,35,IMG_1.jpg,\"Paris, France\"");
        assert_eq!(lines[2], "2023-06-15 14:00:00,Segment 2,48.2,16.37,,GPX Point,Unknown");
    }

    #[test]
    fn test_zero_altitude_is_omitted() {
        let day = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let points = vec![TripPoint::new(day.and_hms_opt(9, 0, 0).unwrap(), GpsPoint::new(52.37, 4.89))
            .with_altitude(Some(0.0))
            .with_source(SourceRef::File("/p/IMG_2.jpg".into()))];
        let clusters = segment(points, &SegmentConfig::default());
        let dir = tempdir().unwrap();

        let md_path = dir.path().join("trip.md");
        write_summary(&clusters, &md_path, None).unwrap();
        assert!(fs::read_to_string(&md_path).unwrap().contains("- 09:00 @ (52.37000,4.89000)\n"));

        let csv_path = dir.path().join("trip.csv");
        write_csv(&clusters, &csv_path, None).unwrap();
        let csv = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv.lines().nth(1), Some("2023-06-15 09:00:00,Segment 1,52.37,4.89,,IMG_2.jpg,"));
    }

    #[test]
    fn test_csv_quotes_embedded_quotes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip.csv");
        let geocoder =
            StaticGeocoder::new().with_address(GpsPoint::new(48.85, 2.35), "Caf\u{e9} \"Le Dôme\", Paris");
        write_csv(&clusters(), &path, Some(&geocoder)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][6], "Caf\u{e9} \"Le Dôme\", Paris");
        assert!(fs::read_to_string(&path).unwrap().contains("\"Caf\u{e9} \"\"Le Dôme\"\", Paris\""));
    }
}
