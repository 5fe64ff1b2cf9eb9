//! Unified error type for trip reconstruction.
//!
//! Missing data (no GPS, no EXIF date, failed geocode) is never an error here:
//! it travels as `Option` through the pipeline. These variants cover the
//! conditions that end a whole invocation.

use thiserror::Error;

/// Errors surfaced by the public API.
#[derive(Debug, Error)]
pub enum TripError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to parse GPX: {0}")]
    GpxParse(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid date '{input}', expected {expected}")]
    InvalidDate { input: String, expected: String },

    #[error("invalid date range '{0}', use YYYY-MM-DD:YYYY-MM-DD")]
    InvalidDateRange(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("no usable photos or GPX points with location data")]
    NoUsableItems,

    #[error("no trip segments with at least {min_items} items")]
    NoClusters { min_items: usize },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(String),
}

impl TripError {
    /// True for the "nothing to output" terminations, which callers report
    /// to the user without treating the run as failed.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, TripError::NoUsableItems | TripError::NoClusters { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TripError>;
