#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Occurrence record loading and reporting-period filtering.
//!
//! [`loader`] reads occurrence records from JSON or CSV exports of the
//! chatbot reporting channel and validates the required fields up front.
//! [`period`] restricts a record collection to a date window given as an
//! explicit start/end pair or as "the last N days".

pub mod loader;
pub mod parsing;
pub mod period;

use thiserror::Error;

pub use aedes_map_occurrence_models::{Coordinates, Occurrence, PeriodSpec, PeriodWindow};

/// Errors raised while loading occurrence records.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON input was malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSV input was malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The file extension is not one of the supported formats.
    #[error("Unsupported occurrence file format: {path}")]
    UnsupportedFormat {
        /// Path of the offending file.
        path: String,
    },

    /// The top-level JSON value was neither an array of records nor an
    /// object of columns.
    #[error("Occurrence JSON must be an array of records or an object of columns")]
    NotARecordArray,

    /// A required field was absent or empty.
    #[error("Record {row}: missing required field '{field}'")]
    MissingField {
        /// Zero-based record index.
        row: usize,
        /// Field name as it appears in the source.
        field: &'static str,
    },

    /// The timestamp field could not be parsed.
    #[error("Record {row}: invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// Zero-based record index.
        row: usize,
        /// The raw value.
        value: String,
    },

    /// A coordinate field held a non-numeric value.
    #[error("Record {row}: invalid {field} '{value}'")]
    InvalidCoordinate {
        /// Zero-based record index.
        row: usize,
        /// Field name as it appears in the source.
        field: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Errors raised while resolving a [`PeriodSpec`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    /// A date parameter was not in `YYYY-MM-DD` format.
    #[error("Parameter {parameter} must be in YYYY-MM-DD format (got '{value}')")]
    InvalidDateFormat {
        /// The command-line parameter that carried the value.
        parameter: &'static str,
        /// The raw value.
        value: String,
    },

    /// `last_days` was zero.
    #[error("Parameter --ultimos_dias must be a positive integer")]
    NonPositiveLastDays,
}
