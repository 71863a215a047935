#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! District boundary and per-district count types.
//!
//! Defines the configuration schema for a district boundary source, the
//! normalized boundary produced after loading, and the count table produced
//! by aggregation.

use std::path::PathBuf;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// Where to load district polygons from and how to read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictSource {
    /// Shapefile (`.shp`) or `GeoJSON` (`.geojson`/`.json`) path.
    pub path: PathBuf,
    /// Attribute holding the district name (e.g. `"ds_nome"`).
    pub name_field: String,
    /// CRS of the stored coordinates (e.g. `"EPSG:31983"`).
    pub source_crs: String,
}

/// A district polygon in WGS84 longitude/latitude.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictBoundary {
    /// Name as it appears in the source.
    pub name: String,
    /// Accent-stripped, uppercase, whitespace-collapsed name.
    pub normalized_name: String,
    /// Boundary geometry.
    pub geometry: MultiPolygon<f64>,
}

/// Count for a single target district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictCount {
    /// Display name, as spelled in the target list.
    pub name: String,
    pub count: u64,
}

/// Per-district occurrence counts for the configured target districts.
///
/// Always holds one row per target district, in target-list order, even
/// when the count is zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictCounts {
    pub rows: Vec<DistrictCount>,
    /// Located occurrences that matched no target district.
    pub unmatched: u64,
    /// Occurrences without coordinates, which cannot be matched.
    pub unlocated: u64,
}

impl DistrictCounts {
    /// Sum of the per-district counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Count for the district displayed as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.rows.iter().find(|r| r.name == name).map(|r| r.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_rows() {
        let counts = DistrictCounts {
            rows: vec![
                DistrictCount {
                    name: "CAMBUCI".to_string(),
                    count: 2,
                },
                DistrictCount {
                    name: "IPIRANGA".to_string(),
                    count: 5,
                },
            ],
            unmatched: 9,
            unlocated: 1,
        };
        assert_eq!(counts.total(), 7);
        assert_eq!(counts.get("IPIRANGA"), Some(5));
        assert_eq!(counts.get("SÉ"), None);
    }
}
