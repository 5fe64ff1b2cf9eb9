//! # Timestamp Resolution
//!
//! Produces a single best timestamp per photo from several unreliable sources.
//! Priority order, first success wins:
//!
//! 1. EXIF `DateTimeOriginal`, shifted by `tz_shift_hours`
//! 2. Filename patterns (only when `use_filename_dates` is set)
//! 3. Other embedded date fields (`DateTime`, `DateTimeDigitized`)
//! 4. Filesystem modification time
//!
//! Step 4 cannot fail for a readable file, so resolution is total whenever
//! an mtime is supplied.
//!
//! Filename layouts are a configuration table rather than fixed logic: naming
//! conventions differ between cameras, phones and messengers, and a bare
//! four-digit token can be misread as a year. The defaults reproduce the
//! common layouts, full date+time patterns first and the bare-year fallback last.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripError};
use crate::metadata::MediaMetadata;

/// EXIF date layout.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// What a filename pattern captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Six groups: year, month, day, hour, minute, second
    DateTime,
    /// One group: year. Resolves to January 1st, 12:00.
    Year,
}

/// A filename timestamp layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenamePattern {
    pub pattern: String,
    pub kind: PatternKind,
}

impl FilenamePattern {
    pub fn date_time(pattern: &str) -> Self {
        Self { pattern: pattern.to_string(), kind: PatternKind::DateTime }
    }

    pub fn year(pattern: &str) -> Self {
        Self { pattern: pattern.to_string(), kind: PatternKind::Year }
    }
}

/// Default filename layouts, most specific first.
pub fn default_filename_patterns() -> Vec<FilenamePattern> {
    vec![
        // IMG_YYYYMMDD_HHMMSS
        FilenamePattern::date_time(r"IMG_(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})"),
        // YYYY-MM-DD_HH-MM-SS
        FilenamePattern::date_time(r"(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})"),
        // YYYYMMDD_HHMMSS
        FilenamePattern::date_time(r"(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})"),
        // IMG-YYYYMMDD-HHMMSS
        FilenamePattern::date_time(r"IMG-(\d{4})(\d{2})(\d{2})-(\d{2})(\d{2})(\d{2})"),
        // WhatsApp Image YYYY-MM-DD at HH.MM.SS
        FilenamePattern::date_time(
            r"WhatsApp Image (\d{4})-(\d{2})-(\d{2}) at (\d{2})\.(\d{2})\.(\d{2})",
        ),
        // Photo YYYY-MM-DD HH-MM-SS
        FilenamePattern::date_time(r"Photo (\d{4})-(\d{2})-(\d{2}) (\d{2})-(\d{2})-(\d{2})"),
        // YYYYMMDD_HHMMSS_suffix
        FilenamePattern::date_time(r"^(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})_\w+"),
        // Bare year
        FilenamePattern::year(r"(\d{4})[_-]"),
    ]
}

/// Configuration for timestamp resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    /// Hours added to EXIF `DateTimeOriginal`.
    /// Default: 0
    pub tz_shift_hours: i64,

    /// Try filename patterns before the remaining embedded fields.
    /// Default: false
    pub use_filename_dates: bool,

    /// Ordered filename layouts.
    pub filename_patterns: Vec<FilenamePattern>,

    /// Bare-year matches outside [min_year, max_year] are ignored.
    /// Default: 1900..=2100
    pub min_year: i32,
    pub max_year: i32,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            tz_shift_hours: 0,
            use_filename_dates: false,
            filename_patterns: default_filename_patterns(),
            min_year: 1900,
            max_year: 2100,
        }
    }
}

/// Which source produced a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    CaptureTime,
    Filename,
    Embedded,
    FileModified,
}

/// A resolved timestamp and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimestamp {
    pub time: NaiveDateTime,
    pub source: TimestampSource,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    regex: Regex,
    kind: PatternKind,
}

/// Compiled timestamp resolver.
#[derive(Debug, Clone)]
pub struct TimestampResolver {
    tz_shift: Duration,
    use_filename_dates: bool,
    patterns: Vec<CompiledPattern>,
    min_year: i32,
    max_year: i32,
}

impl TimestampResolver {
    /// Compile the configured filename patterns.
    ///
    /// Fails with [`TripError::InvalidPattern`] when a pattern does not parse
    /// or has the wrong number of capture groups for its kind, and with
    /// [`TripError::InvalidConfig`] when the timezone shift is out of range.
    pub fn new(config: &TimestampConfig) -> Result<Self> {
        let patterns = config
            .filename_patterns
            .iter()
            .map(compile_pattern)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tz_shift: Duration::try_hours(config.tz_shift_hours).ok_or_else(|| {
                TripError::InvalidConfig(format!("tz_shift_hours {} is out of range", config.tz_shift_hours))
            })?,
            use_filename_dates: config.use_filename_dates,
            patterns,
            min_year: config.min_year,
            max_year: config.max_year,
        })
    }

    /// Resolve the best timestamp for one photo.
    ///
    /// `metadata` is `None` when the file had no readable metadata; `mtime`
    /// is `None` only when the filesystem entry itself was unreadable.
    pub fn resolve(
        &self,
        metadata: Option<&MediaMetadata>,
        filename: &str,
        mtime: Option<NaiveDateTime>,
    ) -> Option<ResolvedTimestamp> {
        let capture = metadata
            .and_then(|m| m.date_time_original.as_deref())
            .and_then(parse_exif_datetime)
            .and_then(|t| t.checked_add_signed(self.tz_shift));
        if let Some(time) = capture {
            return Some(ResolvedTimestamp { time, source: TimestampSource::CaptureTime });
        }

        if self.use_filename_dates {
            if let Some(time) = self.from_filename(filename) {
                return Some(ResolvedTimestamp { time, source: TimestampSource::Filename });
            }
        }

        let embedded = metadata.and_then(|m| {
            [m.date_time.as_deref(), m.date_time_digitized.as_deref()]
                .into_iter()
                .flatten()
                .find_map(parse_exif_datetime)
        });
        if let Some(time) = embedded {
            return Some(ResolvedTimestamp { time, source: TimestampSource::Embedded });
        }

        mtime.map(|time| ResolvedTimestamp { time, source: TimestampSource::FileModified })
    }

    /// Match a filename against the pattern table.
    ///
    /// A pattern whose captures do not form a valid calendar date falls
    /// through to the next one.
    pub fn from_filename(&self, filename: &str) -> Option<NaiveDateTime> {
        for pattern in &self.patterns {
            let Some(caps) = pattern.regex.captures(filename) else {
                continue;
            };
            let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

            let parsed = match pattern.kind {
                PatternKind::DateTime => (|| {
                    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
                    NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?
                        .and_hms_opt(field(4)?, field(5)?, field(6)?)
                })(),
                PatternKind::Year => caps
                    .get(1)
                    .and_then(|m| m.as_str().parse::<i32>().ok())
                    .filter(|y| (self.min_year..=self.max_year).contains(y))
                    .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
                    .and_then(|d| d.and_hms_opt(12, 0, 0)),
            };

            match parsed {
                Some(time) => return Some(time),
                None => debug!(
                    "[TimestampResolver] '{}' matched {} but is not a valid date",
                    filename,
                    pattern.regex.as_str()
                ),
            }
        }
        None
    }
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` string.
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim().trim_end_matches('\0'), EXIF_DATETIME_FORMAT).ok()
}

fn compile_pattern(pattern: &FilenamePattern) -> Result<CompiledPattern> {
    let regex = Regex::new(&pattern.pattern).map_err(|e| TripError::InvalidPattern {
        pattern: pattern.pattern.clone(),
        reason: e.to_string(),
    })?;

    // captures_len counts the implicit whole-match group
    let expected = match pattern.kind {
        PatternKind::DateTime => 7,
        PatternKind::Year => 2,
    };
    if regex.captures_len() != expected {
        return Err(TripError::InvalidPattern {
            pattern: pattern.pattern.clone(),
            reason: format!(
                "expected {} capture groups, found {}",
                expected - 1,
                regex.captures_len() - 1
            ),
        });
    }

    Ok(CompiledPattern { regex, kind: pattern.kind })
}
