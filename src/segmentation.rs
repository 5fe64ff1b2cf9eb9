//! # Trip Segmentation
//!
//! Partitions a chronologically ordered timeline into trip segments.
//!
//! ## Algorithm
//! Single left-to-right pass. Each point joins the open cluster when both
//! gaps to the previous point hold:
//! 1. elapsed time ≤ `time_gap_hours`
//! 2. haversine distance ≤ `distance_gap_km`
//!
//! Otherwise the open cluster is closed and the point starts a new one.
//! Concatenating the clusters reproduces the input exactly.
//!
//! Minimum-size filtering is a separate step ([`retain_min_size`]) so the
//! partition property holds for [`segment`] on its own.

use chrono::{Duration, NaiveDateTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripError};
use crate::geo_utils::{haversine_km, polyline_length};
use crate::{Bounds, GpsPoint, TripPoint};

/// Configuration for trip segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Maximum time between consecutive points of one segment (hours)
    pub time_gap_hours: f64,
    /// Maximum distance between consecutive points of one segment (km)
    pub distance_gap_km: f64,
    /// Segments with fewer points are dropped by the caller
    pub min_cluster_size: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            time_gap_hours: 4.0,   // Overnight or a long transfer splits a segment
            distance_gap_km: 25.0, // Beyond a city's extent
            min_cluster_size: 3,   // Drop stray one-off shots
        }
    }
}

impl SegmentConfig {
    /// Both gaps must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("time_gap_hours", self.time_gap_hours), ("distance_gap_km", self.distance_gap_km)] {
            if !value.is_finite() || value < 0.0 {
                return Err(TripError::InvalidConfig(format!("{} must be a finite value >= 0, got {}", name, value)));
            }
        }
        Ok(())
    }

    /// Time gap as a duration, saturating instead of overflowing.
    /// Unvalidated negative or NaN gaps collapse to zero.
    fn time_gap(&self) -> Duration {
        let ms = (self.time_gap_hours * 3_600_000.0).round();
        if !(ms > 0.0) {
            return Duration::zero();
        }
        // `as` saturates at i64::MAX, which is still a valid TimeDelta
        Duration::try_milliseconds(ms as i64).unwrap_or(Duration::MAX)
    }
}

/// An ordered, non-empty run of trip points.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    points: Vec<TripPoint>,
}

impl Cluster {
    /// Wrap points as a cluster; `None` when empty.
    pub fn new(points: Vec<TripPoint>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    pub fn points(&self) -> &[TripPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<TripPoint> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &TripPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TripPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn start(&self) -> NaiveDateTime {
        self.first().timestamp
    }

    pub fn end(&self) -> NaiveDateTime {
        self.last().timestamp
    }

    pub fn coordinates(&self) -> Vec<GpsPoint> {
        self.points.iter().map(|p| p.point).collect()
    }

    /// Path length through all points in meters.
    pub fn distance_m(&self) -> f64 {
        polyline_length(&self.coordinates())
    }

    pub fn bounds(&self) -> Bounds {
        let seed = self.first().point;
        self.points.iter().fold(
            Bounds {
                min_lat: seed.latitude,
                max_lat: seed.latitude,
                min_lng: seed.longitude,
                max_lng: seed.longitude,
            },
            |b, p| Bounds {
                min_lat: b.min_lat.min(p.point.latitude),
                max_lat: b.max_lat.max(p.point.latitude),
                min_lng: b.min_lng.min(p.point.longitude),
                max_lng: b.max_lng.max(p.point.longitude),
            },
        )
    }

    /// `2023-06-15` for a single day, `2023-06-15 to 2023-06-17` otherwise.
    pub fn span_label(&self) -> String {
        let start = self.start().date();
        let end = self.end().date();
        if start == end {
            start.format("%Y-%m-%d").to_string()
        } else {
            format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
        }
    }
}

/// Split an ordered timeline into clusters.
///
/// Input must already be sorted by timestamp (see
/// [`merge_timelines`](crate::merge_timelines)). Empty input yields no
/// clusters.
pub fn segment(points: Vec<TripPoint>, config: &SegmentConfig) -> Vec<Cluster> {
    let gap = config.time_gap();
    let total = points.len();
    let mut clusters = Vec::new();
    let mut current: Vec<TripPoint> = Vec::new();

    for point in points {
        let joins = match current.last() {
            None => true,
            Some(last) => {
                let elapsed = point.timestamp - last.timestamp;
                let km = haversine_km(&last.point, &point.point);
                let joins = elapsed <= gap && km <= config.distance_gap_km;
                if !joins {
                    debug!(
                        "[Segmentation] Split at {}: {:.1}h, {:.1}km since previous",
                        point.timestamp,
                        elapsed.num_seconds() as f64 / 3600.0,
                        km
                    );
                }
                joins
            }
        };

        if !joins {
            clusters.push(Cluster { points: std::mem::take(&mut current) });
        }
        current.push(point);
    }

    if !current.is_empty() {
        clusters.push(Cluster { points: current });
    }

    info!("[Segmentation] {} points -> {} segments", total, clusters.len());
    clusters
}

/// Drop clusters with fewer than `min_size` points, preserving order.
pub fn retain_min_size(clusters: Vec<Cluster>, min_size: usize) -> Vec<Cluster> {
    let before = clusters.len();
    let kept: Vec<Cluster> = clusters.into_iter().filter(|c| c.len() >= min_size).collect();
    if kept.len() < before {
        info!(
            "[Segmentation] Dropped {} segments with fewer than {} points",
            before - kept.len(),
            min_size
        );
    }
    kept
}
