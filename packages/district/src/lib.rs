#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! District boundary loading, name normalization, and occurrence
//! aggregation.
//!
//! Boundaries come from the municipal district shapefile (or a `GeoJSON`
//! export of it), are reprojected to WGS84, and are matched by normalized
//! name against a fixed list of target districts. Occurrences are then
//! counted per target district with a buffered point-in-polygon join.

pub mod aggregate;
pub mod boundaries;
pub mod normalize;

use thiserror::Error;

pub use aedes_map_district_models::{
    DistrictBoundary, DistrictCount, DistrictCounts, DistrictSource,
};

/// Errors that can occur while loading district boundaries.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The shapefile or its attribute table was malformed.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// The `GeoJSON` document was malformed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Reprojection to WGS84 failed.
    #[error("Reprojection error: {0}")]
    Reproject(#[from] aedes_map_spatial::reproject::ReprojectError),

    /// The file extension is not a supported boundary format.
    #[error("Unsupported boundary file format: {path}")]
    UnsupportedFormat {
        /// Path of the offending file.
        path: String,
    },
}
