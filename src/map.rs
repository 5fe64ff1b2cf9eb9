//! # HTML Map Export
//!
//! Self-contained Leaflet page per trip. Cluster data is embedded as a
//! GeoJSON `FeatureCollection`:
//! - one `LineString` per segment (`kind: "track"`)
//! - one `Point` per item (`kind: "photo"` or `"gps"`)
//! - with [`MapStyle::Advanced`], `Point`s for segment start/end
//!   (`kind: "start"` / `"end"`)
//!
//! The advanced style also adds a heat layer and a time slider that replays
//! the trip in chronological order.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::geo_utils::compute_center;
use crate::gpx_io::escape_xml;
use crate::segmentation::Cluster;
use crate::GpsPoint;

/// Segment colors, cycled.
const PALETTE: [&str; 7] = ["red", "blue", "green", "orange", "purple", "darkred", "cadetblue"];

/// Map flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStyle {
    /// Tracks and point markers
    #[default]
    Basic,
    /// Adds start/end markers, a heat layer and a time slider
    Advanced,
}

/// Color of the segment at `idx`.
pub fn segment_color(idx: usize) -> &'static str {
    PALETTE[idx % PALETTE.len()]
}

/// Segment name used in tooltips: `Trip N: start[ to end]`.
fn track_name(idx: usize, cluster: &Cluster) -> String {
    format!("Trip {}: {}", idx + 1, cluster.span_label())
}

/// Build the GeoJSON payload for a set of clusters.
pub fn cluster_geojson(clusters: &[Cluster], style: MapStyle) -> Value {
    let mut features = Vec::new();

    for (idx, cluster) in clusters.iter().enumerate() {
        let color = segment_color(idx);
        let name = track_name(idx, cluster);
        let line: Vec<[f64; 2]> = cluster
            .points()
            .iter()
            .map(|p| [p.point.longitude, p.point.latitude])
            .collect();

        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": line },
            "properties": { "kind": "track", "segment": idx + 1, "color": color, "name": name },
        }));

        for point in cluster.points() {
            let filename = point.display_name();
            let when = point.timestamp.format("%Y-%m-%d %H:%M").to_string();
            let popup = format!(
                "<b>{}</b><br>{}<br>{:.5}, {:.5}",
                escape_xml(&filename),
                when,
                point.point.latitude,
                point.point.longitude
            );
            features.push(json!({
                "type": "Feature",
                "geometry": point_geometry(&point.point),
                "properties": {
                    "kind": if point.photo_path().is_some() { "photo" } else { "gps" },
                    "segment": idx + 1,
                    "color": color,
                    "name": filename,
                    "time": point.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "popup": popup,
                },
            }));
        }

        if style == MapStyle::Advanced {
            let (first, last) = (cluster.first(), cluster.last());
            for (kind, point, label) in [
                ("start", first, format!("Start: {}", first.timestamp.format("%Y-%m-%d"))),
                ("end", last, format!("End: {}", last.timestamp.format("%Y-%m-%d"))),
            ] {
                features.push(json!({
                    "type": "Feature",
                    "geometry": point_geometry(&point.point),
                    "properties": { "kind": kind, "segment": idx + 1, "color": color, "name": label },
                }));
            }
        }
    }

    json!({ "type": "FeatureCollection", "features": features })
}

fn point_geometry(p: &GpsPoint) -> Value {
    json!({ "type": "Point", "coordinates": [p.longitude, p.latitude] })
}

/// Render the full HTML page.
pub fn render_map(clusters: &[Cluster], style: MapStyle, title: &str) -> String {
    let all: Vec<GpsPoint> = clusters.iter().flat_map(|c| c.coordinates()).collect();
    let center = compute_center(&all);
    let data = cluster_geojson(clusters, style);

    // "</" inside a <script> block would end it early
    let data_js = data.to_string().replace("</", "<\\/");

    let mut html = MAP_TEMPLATE
        .replace("__TITLE__", &escape_xml(title))
        .replace("__CENTER__", &format!("[{:.6}, {:.6}]", center.latitude, center.longitude))
        .replace("__ADVANCED__", if style == MapStyle::Advanced { "true" } else { "false" })
        .replace("__DATA__", &data_js);

    if style == MapStyle::Advanced {
        html = html.replace("<!--HEAT-->", HEAT_SCRIPT);
    }
    html
}

/// Write the map page to `path`. Nothing is written for an empty trip.
pub fn write_map(clusters: &[Cluster], path: &Path, style: MapStyle) -> Result<()> {
    if clusters.is_empty() {
        warn!("[Map] No data to generate map for {}", path.display());
        return Ok(());
    }
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Trip".to_string());
    fs::write(path, render_map(clusters, style, &title))?;
    info!("[Map] Wrote {:?} map with {} segments to {}", style, clusters.len(), path.display());
    Ok(())
}

const HEAT_SCRIPT: &str =
    r#"<script src="https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js"></script>"#;

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<!--HEAT-->
<style>
  html, body { margin: 0; height: 100%; font-family: sans-serif; }
  #map { position: absolute; top: 0; bottom: 0; width: 100%; }
  #timeline { position: absolute; bottom: 20px; left: 50px; right: 50px; z-index: 1000;
              background: rgba(255,255,255,0.9); padding: 8px 12px; border-radius: 6px; display: none; }
  #timeline input { width: 100%; }
</style>
</head>
<body>
<div id="map"></div>
<div id="timeline"><span id="timeline-label"></span><input id="timeline-slider" type="range" min="0" value="0"></div>
<script>
const data = __DATA__;
const advanced = __ADVANCED__;
const map = L.map('map').setView(__CENTER__, advanced ? 5 : 6);
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  maxZoom: 19, attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);

const bounds = [];
const points = [];
for (const f of data.features) {
  const p = f.properties;
  if (f.geometry.type === 'LineString') {
    const latlngs = f.geometry.coordinates.map(c => [c[1], c[0]]);
    L.polyline(latlngs, { color: p.color, weight: advanced ? 3 : 2.5, opacity: 0.8 })
      .bindTooltip(p.name).addTo(map);
    latlngs.forEach(ll => bounds.push(ll));
    continue;
  }
  const ll = [f.geometry.coordinates[1], f.geometry.coordinates[0]];
  if (p.kind === 'start' || p.kind === 'end') {
    L.marker(ll, { title: p.name }).bindTooltip(p.name).addTo(map);
  } else {
    const marker = L.circleMarker(ll, { radius: 3, color: p.color, fill: true }).bindPopup(p.popup);
    marker.addTo(map);
    points.push({ time: p.time, ll: ll, marker: marker });
  }
}
if (bounds.length) { map.fitBounds(bounds, { padding: [20, 20] }); }

if (advanced) {
  if (L.heatLayer) { L.heatLayer(points.map(p => [p.ll[0], p.ll[1], 1.0]), { radius: 20 }).addTo(map); }
  points.sort((a, b) => a.time < b.time ? -1 : a.time > b.time ? 1 : 0);
  const slider = document.getElementById('timeline-slider');
  const label = document.getElementById('timeline-label');
  document.getElementById('timeline').style.display = points.length ? 'block' : 'none';
  slider.max = Math.max(points.length - 1, 0);
  slider.value = slider.max;
  const replay = () => {
    const upto = Number(slider.value);
    points.forEach((p, i) => { if (i <= upto) { p.marker.addTo(map); } else { p.marker.remove(); } });
    if (points.length) { label.textContent = points[upto].time; }
  };
  slider.addEventListener('input', replay);
  replay();
}
</script>
</body>
</html>
"#;
