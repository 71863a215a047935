//! Loads district polygons from a Shapefile or `GeoJSON` file.
//!
//! Geometries are reprojected from the source CRS into WGS84 and each
//! feature's name is read from the configured attribute. Features without a
//! name or without polygonal geometry are skipped.

use std::path::Path;

use aedes_map_district_models::{DistrictBoundary, DistrictSource};
use aedes_map_spatial::reproject::Reprojector;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::GeoJson;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape};

use crate::BoundaryError;
use crate::normalize::normalize_name;

/// Loads every named polygon feature of `source`, in file order.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the file cannot be read or parsed, or if
/// reprojection fails.
pub fn load_boundaries(source: &DistrictSource) -> Result<Vec<DistrictBoundary>, BoundaryError> {
    let extension = source
        .path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let raw = match extension.as_deref() {
        Some("shp") => read_shapefile(&source.path, &source.name_field)?,
        Some("geojson" | "json") => read_geojson(
            &std::fs::read_to_string(&source.path)?,
            &source.name_field,
        )?,
        _ => {
            return Err(BoundaryError::UnsupportedFormat {
                path: source.path.display().to_string(),
            });
        }
    };

    let reprojector = Reprojector::to_wgs84(&source.source_crs)?;

    let boundaries = raw
        .into_iter()
        .map(|(name, geometry)| {
            Ok(DistrictBoundary {
                normalized_name: normalize_name(&name),
                geometry: reprojector.transform_multi_polygon(&geometry)?,
                name,
            })
        })
        .collect::<Result<Vec<_>, BoundaryError>>()?;

    log::info!(
        "Loaded {} district boundar(ies) from {} ({})",
        boundaries.len(),
        source.path.display(),
        source.source_crs
    );
    Ok(boundaries)
}

/// Reads `(name, polygon)` pairs from a shapefile and its `.dbf` table.
///
/// # Errors
///
/// Returns [`BoundaryError::Shapefile`] if the shapefile cannot be read.
pub fn read_shapefile(
    path: &Path,
    name_field: &str,
) -> Result<Vec<(String, MultiPolygon<f64>)>, BoundaryError> {
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut features = Vec::new();

    for (idx, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let Some(name) = record_name(&record, name_field) else {
            log::warn!("Shape {idx} has no '{name_field}' attribute, skipping");
            continue;
        };

        let polygon = match shape {
            Shape::Polygon(p) => rings_to_multi_polygon(p.rings(), |pt| (pt.x, pt.y)),
            Shape::PolygonM(p) => rings_to_multi_polygon(p.rings(), |pt| (pt.x, pt.y)),
            Shape::PolygonZ(p) => rings_to_multi_polygon(p.rings(), |pt| (pt.x, pt.y)),
            other => {
                log::warn!(
                    "District '{name}' has non-polygon shape {:?}, skipping",
                    other.shapetype()
                );
                continue;
            }
        };

        features.push((name, polygon));
    }

    Ok(features)
}

/// Reads `(name, polygon)` pairs from a `GeoJSON` `FeatureCollection`.
///
/// # Errors
///
/// Returns [`BoundaryError::GeoJson`] if the document is malformed.
pub fn read_geojson(
    json: &str,
    name_field: &str,
) -> Result<Vec<(String, MultiPolygon<f64>)>, BoundaryError> {
    let geojson: GeoJson = json.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => Vec::new(),
    };

    let mut out = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let Some(name) = feature
            .property(name_field)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
        else {
            log::warn!("Feature {idx} has no '{name_field}' property, skipping");
            continue;
        };

        let Some(polygon) = feature.geometry.and_then(geometry_to_multi_polygon) else {
            log::warn!("District '{name}' has no polygon geometry, skipping");
            continue;
        };

        out.push((name, polygon));
    }

    Ok(out)
}

fn geometry_to_multi_polygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Reads a text attribute, matching the field name case-insensitively
/// (DBF field names are often uppercased and truncated to 10 characters).
fn record_name(record: &Record, name_field: &str) -> Option<String> {
    let value = record.get(name_field).cloned().or_else(|| {
        record
            .clone()
            .into_iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name_field))
            .map(|(_, value)| value)
    })?;

    let text = match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => s,
        _ => return None,
    };

    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Groups shapefile rings into polygons: each outer ring followed by its
/// holes. A hole that appears before any outer ring is promoted to an
/// exterior.
fn rings_to_multi_polygon<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> (f64, f64),
) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let mut coords: Vec<Coord<f64>> = ring
            .points()
            .iter()
            .map(|pt| {
                let (x, y) = xy(pt);
                Coord { x, y }
            })
            .collect();
        if coords.first() != coords.last() {
            if let Some(&first) = coords.first() {
                coords.push(first);
            }
        }
        let line = LineString(coords);

        match ring {
            PolygonRing::Outer(_) => {
                if let Some(ext) = exterior.take() {
                    polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(line);
            }
            PolygonRing::Inner(_) if exterior.is_some() => holes.push(line),
            PolygonRing::Inner(_) => exterior = Some(line),
        }
    }

    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polygons)
}
