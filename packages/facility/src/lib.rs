#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Public health facilities (UBS) shown on the map.
//!
//! Facilities are read from a `GeoJSON` point collection and filtered down
//! to those close to at least one reported occurrence, so the map only
//! shows units relevant to the current outbreak area.

use std::path::Path;

use aedes_map_occurrence_models::Occurrence;
use geojson::GeoJson;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default proximity radius, in degrees (about 2 km).
pub const DEFAULT_RADIUS_DEGREES: f64 = 0.02;

/// Property holding the facility name.
pub const FIELD_NAME: &str = "nome";
/// Property holding the facility latitude.
pub const FIELD_LATITUDE: &str = "lat";
/// Property holding the facility longitude.
pub const FIELD_LONGITUDE: &str = "lon";

/// Errors that can occur while loading facilities.
#[derive(Debug, Error)]
pub enum FacilityError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The `GeoJSON` document was malformed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// A public health unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Loads facilities from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`FacilityError`] if the file cannot be read or is not valid
/// `GeoJSON`.
pub fn load_facilities(path: &Path) -> Result<Vec<Facility>, FacilityError> {
    let facilities = parse_facilities(&std::fs::read_to_string(path)?)?;
    log::info!(
        "Loaded {} facilit(ies) from {}",
        facilities.len(),
        path.display()
    );
    Ok(facilities)
}

/// Parses facilities from `GeoJSON` text.
///
/// Coordinates come from the `lat`/`lon` properties, falling back to the
/// point geometry. Features without a name or a usable position are
/// skipped.
///
/// # Errors
///
/// Returns [`FacilityError::GeoJson`] if the document is malformed.
pub fn parse_facilities(json: &str) -> Result<Vec<Facility>, FacilityError> {
    let features = match json.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => Vec::new(),
    };

    let mut facilities = Vec::with_capacity(features.len());
    for (idx, feature) in features.iter().enumerate() {
        let Some(name) = feature
            .property(FIELD_NAME)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            log::debug!("Facility feature {idx} has no name, skipping");
            continue;
        };

        let from_properties = feature
            .property(FIELD_LATITUDE)
            .and_then(number)
            .zip(feature.property(FIELD_LONGITUDE).and_then(number));

        let from_geometry = || match feature.geometry.as_ref().map(|g| &g.value) {
            Some(geojson::Value::Point(pos)) if pos.len() >= 2 => Some((pos[1], pos[0])),
            _ => None,
        };

        let Some((latitude, longitude)) = from_properties.or_else(from_geometry) else {
            log::warn!("Facility '{name}' has no position, skipping");
            continue;
        };

        facilities.push(Facility {
            name: name.to_string(),
            latitude,
            longitude,
        });
    }

    Ok(facilities)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Facilities strictly within `radius` degrees of at least one located
/// occurrence, in input order. With no located occurrences the result is
/// empty.
#[must_use]
pub fn nearby(facilities: &[Facility], occurrences: &[Occurrence], radius: f64) -> Vec<Facility> {
    let points: Vec<[f64; 2]> = occurrences
        .iter()
        .filter_map(|o| o.coordinates)
        .map(|c| [c.longitude, c.latitude])
        .collect();

    if points.is_empty() {
        return Vec::new();
    }

    let tree = RTree::bulk_load(points);
    let radius_sq = radius * radius;

    let kept: Vec<Facility> = facilities
        .iter()
        .filter(|f| {
            let query_env = AABB::from_corners(
                [f.longitude - radius, f.latitude - radius],
                [f.longitude + radius, f.latitude + radius],
            );
            tree.locate_in_envelope_intersecting(&query_env)
                .any(|&[x, y]| {
                    let dx = x - f.longitude;
                    let dy = y - f.latitude;
                    dx.mul_add(dx, dy * dy) < radius_sq
                })
        })
        .cloned()
        .collect();

    log::info!(
        "{} of {} facilit(ies) within {radius} degrees of an occurrence",
        kept.len(),
        facilities.len()
    );
    kept
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use aedes_map_occurrence_models::Coordinates;
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn occurrence(lat: f64, lon: f64) -> Occurrence {
        Occurrence {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            coordinates: Some(Coordinates::new(lat, lon)),
            disease: "Dengue".to_string(),
            address: None,
        }
    }

    fn facility(name: &str, lat: f64, lon: f64) -> Facility {
        Facility {
            name: name.to_string(),
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn parses_properties_and_geometry_fallback() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "nome": "UBS Cambuci", "lat": -23.566, "lon": -46.62 },
                    "geometry": null
                },
                {
                    "type": "Feature",
                    "properties": { "nome": "UBS Liberdade" },
                    "geometry": { "type": "Point", "coordinates": [-46.635, -23.56] }
                },
                {
                    "type": "Feature",
                    "properties": { "nome": "UBS Ipiranga", "lat": "-23,59", "lon": "-46,60" },
                    "geometry": null
                },
                {
                    "type": "Feature",
                    "properties": { "lat": 1.0, "lon": 2.0 },
                    "geometry": null
                },
                {
                    "type": "Feature",
                    "properties": { "nome": "Sem posição" },
                    "geometry": null
                }
            ]
        });

        let facilities = parse_facilities(&doc.to_string()).unwrap();
        assert_eq!(
            facilities,
            vec![
                facility("UBS Cambuci", -23.566, -46.62),
                facility("UBS Liberdade", -23.56, -46.635),
                facility("UBS Ipiranga", -23.59, -46.60),
            ]
        );
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".geojson")
            .tempfile()
            .unwrap();
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "nome": "UBS Aclimação", "lat": -23.57, "lon": -46.63 },
                "geometry": null
            }]
        });
        file.write_all(doc.to_string().as_bytes()).unwrap();
        file.flush().unwrap();

        let facilities = load_facilities(file.path()).unwrap();
        assert_eq!(facilities.len(), 1);
        assert_eq!(facilities[0].name, "UBS Aclimação");
    }

    #[test]
    fn rejects_malformed_geojson() {
        assert!(matches!(
            parse_facilities("{ not json"),
            Err(FacilityError::GeoJson(_))
        ));
    }

    #[test]
    fn keeps_only_facilities_near_occurrences() {
        let facilities = vec![
            facility("near", -23.57, -46.63),
            facility("far", -23.70, -46.80),
            facility("edge", -23.57, -46.605),
        ];
        let occurrences = vec![occurrence(-23.571, -46.631), occurrence(-23.57, -46.62)];

        let kept = nearby(&facilities, &occurrences, DEFAULT_RADIUS_DEGREES);
        let names: Vec<&str> = kept.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["near", "edge"]);
    }

    #[test]
    fn radius_is_exclusive() {
        let facilities = vec![facility("boundary", 0.0, 0.5)];
        let occurrences = vec![occurrence(0.0, 0.0)];
        assert!(nearby(&facilities, &occurrences, 0.5).is_empty());
        assert_eq!(nearby(&facilities, &occurrences, 0.51).len(), 1);
    }

    #[test]
    fn no_occurrences_means_no_facilities() {
        let facilities = vec![facility("UBS", -23.57, -46.63)];
        assert!(nearby(&facilities, &[], DEFAULT_RADIUS_DEGREES).is_empty());

        let unlocated = Occurrence {
            coordinates: None,
            ..occurrence(0.0, 0.0)
        };
        assert!(nearby(&facilities, &[unlocated], DEFAULT_RADIUS_DEGREES).is_empty());
    }
}
