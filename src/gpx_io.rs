//! GPX import and export.
//!
//! Import goes through the `gpx` crate. Export is written directly: the
//! documents are small, fixed-shape GPX 1.1 files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{info, warn};

use crate::error::{Result, TripError};
use crate::segmentation::Cluster;
use crate::{GpsPoint, SourceRef, TripPoint};

const CREATOR: &str = "photo-trip";
const GPX_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Load all timed points of a GPX file's tracks and routes, sorted by time.
///
/// Points without a timestamp cannot be placed on the timeline and are
/// dropped. Times are converted to UTC and stored naive.
pub fn load_track(path: &Path) -> Result<Vec<TripPoint>> {
    let reader = BufReader::new(File::open(path)?);
    let gpx = gpx::read(reader).map_err(|e| TripError::GpxParse(format!("{}: {}", path.display(), e)))?;

    let waypoints = gpx
        .tracks
        .iter()
        .flat_map(|t| t.segments.iter())
        .flat_map(|s| s.points.iter())
        .chain(gpx.routes.iter().flat_map(|r| r.points.iter()));

    let mut points = Vec::new();
    let mut untimed = 0;
    for (index, wpt) in waypoints.enumerate() {
        let Some(time) = wpt.time.as_ref().and_then(|t| gpx_time_to_naive(t)) else {
            untimed += 1;
            continue;
        };
        let geo = wpt.point();
        let point = GpsPoint::new(geo.y(), geo.x());
        if !point.is_valid() {
            continue;
        }

        let source = match &wpt.name {
            Some(name) if !name.trim().is_empty() => SourceRef::Waypoint(name.clone()),
            _ => SourceRef::TrackPoint { file: path.to_path_buf(), index },
        };
        points.push(TripPoint::new(time, point).with_altitude(wpt.elevation).with_source(source));
    }

    if untimed > 0 {
        warn!("[GPX] Dropped {} points without time from {}", untimed, path.display());
    }
    points.sort_by_key(|p| p.timestamp);
    info!("[GPX] Loaded {} points from {}", points.len(), path.display());
    Ok(points)
}

fn gpx_time_to_naive(time: &gpx::Time) -> Option<NaiveDateTime> {
    let iso = time.format().ok()?;
    let utc = DateTime::parse_from_rfc3339(&iso).ok()?.with_timezone(&Utc);
    Some(utc.naive_utc())
}

/// Write one `<trk>` per cluster, named "Segment N".
pub fn write_clusters(clusters: &[Cluster], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_header(&mut writer, "Trip")?;

    for (idx, cluster) in clusters.iter().enumerate() {
        writeln!(writer, "  <trk>")?;
        writeln!(writer, "    <name>Segment {}</name>", idx + 1)?;
        writeln!(writer, "    <trkseg>")?;
        for point in cluster.points() {
            write_trkpt(&mut writer, point, None)?;
        }
        writeln!(writer, "    </trkseg>")?;
        writeln!(writer, "  </trk>")?;
    }

    writeln!(writer, "</gpx>")?;
    writer.flush()?;
    info!("[GPX] Wrote {} segments to {}", clusters.len(), path.display());
    Ok(())
}

/// Write a single named track whose points carry their display names.
pub fn write_route(points: &[TripPoint], name: &str, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_header(&mut writer, name)?;

    writeln!(writer, "  <trk>")?;
    writeln!(writer, "    <name>{}</name>", escape_xml(name))?;
    writeln!(writer, "    <trkseg>")?;
    for point in points {
        write_trkpt(&mut writer, point, Some(&point.display_name()))?;
    }
    writeln!(writer, "    </trkseg>")?;
    writeln!(writer, "  </trk>")?;
    writeln!(writer, "</gpx>")?;
    writer.flush()?;

    info!("[GPX] Wrote route '{}' ({} points) to {}", name, points.len(), path.display());
    Ok(())
}

fn write_header<W: Write>(writer: &mut W, name: &str) -> std::io::Result<()> {
    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<gpx version="1.1" creator="{}" xmlns="http://www.topografix.com/GPX/1/1">"#,
        CREATOR
    )?;
    writeln!(writer, "  <metadata>")?;
    writeln!(writer, "    <name>{}</name>", escape_xml(name))?;
    writeln!(writer, "  </metadata>")
}

fn write_trkpt<W: Write>(writer: &mut W, point: &TripPoint, name: Option<&str>) -> std::io::Result<()> {
    writeln!(
        writer,
        r#"      <trkpt lat="{:.6}" lon="{:.6}">"#,
        point.point.latitude, point.point.longitude
    )?;
    if let Some(ele) = point.altitude {
        writeln!(writer, "        <ele>{:.1}</ele>", ele)?;
    }
    writeln!(writer, "        <time>{}</time>", point.timestamp.format(GPX_TIME_FORMAT))?;
    if let Some(name) = name {
        writeln!(writer, "        <name>{}</name>", escape_xml(name))?;
    }
    writeln!(writer, "      </trkpt>")
}

/// Escape XML special characters
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::{segment, SegmentConfig};
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 15).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_load_drops_untimed_points() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.gpx");
        fs::write(
            &path,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="48.2" lon="16.37"><ele>180</ele><time>2023-06-15T12:00:00Z</time></trkpt>
    <trkpt lat="48.1" lon="16.30"><time>2023-06-15T10:00:00+02:00</time></trkpt>
    <trkpt lat="48.0" lon="16.00"></trkpt>
  </trkseg></trk>
</gpx>"#,
        )
        .unwrap();

        let points = load_track(&path).unwrap();
        assert_eq!(points.len(), 2);
        // +02:00 normalizes to 08:00 UTC and sorts first
        assert_eq!(points[0].timestamp, at(8));
        assert_eq!(points[1].altitude, Some(180.0));
        assert_eq!(points[1].display_name(), "GPX Point");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.gpx");
        fs::write(&path, "not xml at all").unwrap();
        assert!(matches!(load_track(&path), Err(TripError::GpxParse(_))));
    }

    #[test]
    fn test_write_clusters_names_segments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trip.gpx");
        let points = vec![
            TripPoint::new(at(9), GpsPoint::new(48.85, 2.35)).with_altitude(Some(35.0)),
            TripPoint::new(at(20), GpsPoint::new(48.20, 16.37)),
        ];
        write_clusters(&segment(points, &SegmentConfig::default()), &path).unwrap();

        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains("<name>Segment 1</name>"));
        assert!(xml.contains("<name>Segment 2</name>"));
        assert!(xml.contains("<ele>35.0</ele>"));
        assert!(xml.contains("<time>2023-06-15T09:00:00Z</time>"));

        // Our own output is readable by the importer
        assert_eq!(load_track(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_route_keeps_waypoint_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("route.gpx");
        let stops = vec![
            TripPoint::new(at(0), GpsPoint::new(41.9, 12.5)).with_source(SourceRef::Waypoint("Rome".into())),
            TripPoint::new(at(1), GpsPoint::new(43.77, 11.25))
                .with_source(SourceRef::Waypoint("Florence & Co".into())),
        ];
        write_route(&stops, "Custom Route", &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("Florence &amp; Co"));

        let loaded = load_track(&path).unwrap();
        assert_eq!(loaded[0].display_name(), "Rome");
        assert_eq!(loaded[1].display_name(), "Florence & Co");
    }
}
