#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Disease occurrence record and reporting period types.
//!
//! These types are shared by the loader, the period filter, the geocoding
//! adapter and the district aggregator. Records are identified by their
//! position in the loaded collection; there is no explicit key.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A single reported disease case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// When the case was reported (local wall-clock time).
    pub timestamp: NaiveDateTime,
    /// Location of the case. `None` until geocoded.
    pub coordinates: Option<Coordinates>,
    /// Suspected disease label (e.g. "Dengue").
    pub disease: String,
    /// Free-text street address, used for geocoding.
    pub address: Option<String>,
}

impl Occurrence {
    #[must_use]
    pub const fn is_located(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// Raw period parameters as supplied on the command line.
///
/// `last_days` takes exclusive priority: when it is set, `start` and `end`
/// are ignored entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodSpec {
    /// First day to include (`YYYY-MM-DD`).
    pub start: Option<String>,
    /// Last day to include (`YYYY-MM-DD`).
    pub end: Option<String>,
    /// Number of days ending today (inclusive) to include.
    pub last_days: Option<u32>,
}

impl PeriodSpec {
    /// Returns `true` when no filter parameter was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.last_days.is_none()
    }
}

/// A resolved half-open time window `[start, end)`.
///
/// Either bound may be absent, in which case that side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodWindow {
    /// Inclusive lower bound.
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound.
    pub end: Option<NaiveDateTime>,
}

impl PeriodWindow {
    /// A window that accepts every timestamp.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether `timestamp` falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        self.start.is_none_or(|start| *timestamp >= start)
            && self.end.is_none_or(|end| *timestamp < end)
    }
}
