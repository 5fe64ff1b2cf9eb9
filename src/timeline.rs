//! Timeline merging and date filtering.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripError};
use crate::{Item, TripPoint};

/// Anything that sits on the timeline.
pub trait Timestamped {
    fn timestamp(&self) -> NaiveDateTime;
}

impl Timestamped for Item {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl Timestamped for TripPoint {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Concatenate sources and sort ascending by timestamp.
///
/// The sort is stable: items with equal timestamps keep their source order,
/// and within a source their original order.
pub fn merge_timelines<T, I>(sources: I) -> Vec<T>
where
    T: Timestamped,
    I: IntoIterator<Item = Vec<T>>,
{
    let mut merged: Vec<T> = sources.into_iter().flatten().collect();
    merged.sort_by_key(|item| item.timestamp());
    merged
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(TripError::InvalidDateRange(format!("{}:{}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD:YYYY-MM-DD` or a single `YYYY-MM-DD`.
    ///
    /// ```
    /// use photo_trip::DateRange;
    ///
    /// let range = DateRange::parse("2023-06-01:2023-06-30").unwrap();
    /// assert_eq!(range.start.to_string(), "2023-06-01");
    /// assert!(DateRange::parse("June").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || TripError::InvalidDateRange(input.to_string());
        let parse_date = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| invalid());

        match input.split_once(':') {
            Some((start, end)) => Self::new(parse_date(start)?, parse_date(end)?).map_err(|_| invalid()),
            None => {
                let day = parse_date(input)?;
                Ok(Self { start: day, end: day })
            }
        }
    }

    /// True when `time` falls on any day of the range.
    pub fn contains(&self, time: NaiveDateTime) -> bool {
        let day = time.date();
        day >= self.start && day <= self.end
    }

    /// Keep only the items inside the range, preserving order.
    pub fn filter<T: Timestamped>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().filter(|i| self.contains(i.timestamp())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpsPoint;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn point(d: u32, h: u32, lat: f64) -> TripPoint {
        TripPoint::new(at(d, h), GpsPoint::new(lat, 0.0))
    }

    #[test]
    fn test_merge_sorts_across_sources() {
        let photos = vec![point(1, 12, 1.0), point(1, 8, 2.0)];
        let track = vec![point(1, 10, 3.0)];
        let merged = merge_timelines([photos, track]);
        let lats: Vec<f64> = merged.iter().map(|p| p.point.latitude).collect();
        assert_eq!(lats, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_merge_is_stable_on_ties() {
        let a = vec![point(1, 9, 1.0), point(1, 9, 2.0)];
        let b = vec![point(1, 9, 3.0)];
        let merged = merge_timelines([a, b]);
        let lats: Vec<f64> = merged.iter().map(|p| p.point.latitude).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_merge_empty() {
        let merged: Vec<TripPoint> = merge_timelines(Vec::<Vec<TripPoint>>::new());
        assert!(merged.is_empty());
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse("2023-06-01:2023-06-30").unwrap();
        assert!(range.contains(at(1, 0)));
        assert!(range.contains(at(30, 23)));

        let single = DateRange::parse("2023-06-15").unwrap();
        assert_eq!(single.start, single.end);
        assert!(single.contains(at(15, 23)));
        assert!(!single.contains(at(16, 0)));

        assert!(matches!(DateRange::parse("garbage"), Err(TripError::InvalidDateRange(_))));
        assert!(DateRange::parse("2023-06-30:2023-06-01").is_err());
        assert!(DateRange::parse("2023-02-30").is_err());
    }

    #[test]
    fn test_filter() {
        let range = DateRange::parse("2023-06-02").unwrap();
        let kept = range.filter(vec![point(1, 12, 1.0), point(2, 12, 2.0), point(3, 0, 3.0)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].point.latitude, 2.0);
    }
}
