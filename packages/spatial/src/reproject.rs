//! Coordinate reference system conversion for boundary datasets.
//!
//! District boundaries are published in SIRGAS 2000 / UTM zone 23S
//! (EPSG:31983, meters). Everything downstream works in WGS84
//! longitude/latitude degrees (EPSG:4326), so boundaries are reprojected
//! with `proj4rs` at load time.

use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};
use thiserror::Error;

/// WGS84 geographic coordinates.
pub const WGS84: &str = "EPSG:4326";

/// Errors raised while building or applying a reprojection.
#[derive(Debug, Error)]
pub enum ReprojectError {
    /// The CRS identifier is not one of the known EPSG codes or a PROJ.4
    /// string.
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// `proj4rs` rejected a definition or a coordinate.
    #[error("Projection error: {0}")]
    Proj(String),
}

/// A resolved CRS definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsDefinition {
    /// PROJ.4 definition string.
    pub proj4: String,
    /// Whether coordinates are angular (degrees at the API boundary).
    pub geographic: bool,
}

/// Resolves an `EPSG:<code>` identifier or a raw `+proj=` string.
///
/// # Errors
///
/// Returns [`ReprojectError::UnsupportedCrs`] for unknown EPSG codes.
pub fn crs_definition(spec: &str) -> Result<CrsDefinition, ReprojectError> {
    let spec = spec.trim();

    if spec.starts_with("+proj=") {
        let geographic = spec.contains("+proj=longlat") || spec.contains("+proj=latlong");
        return Ok(CrsDefinition {
            proj4: spec.to_string(),
            geographic,
        });
    }

    let code = spec
        .strip_prefix("EPSG:")
        .or_else(|| spec.strip_prefix("epsg:"))
        .unwrap_or(spec);

    let (proj4, geographic) = match code {
        "4326" => ("+proj=longlat +datum=WGS84 +no_defs", true),
        "4674" => (
            "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs",
            true,
        ),
        "31982" => (
            "+proj=utm +zone=22 +south +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            false,
        ),
        "31983" => (
            "+proj=utm +zone=23 +south +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            false,
        ),
        "31984" => (
            "+proj=utm +zone=24 +south +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            false,
        ),
        _ => return Err(ReprojectError::UnsupportedCrs(spec.to_string())),
    };

    Ok(CrsDefinition {
        proj4: proj4.to_string(),
        geographic,
    })
}

/// Converts coordinates from one CRS to another.
pub struct Reprojector {
    inner: Option<Transform>,
}

struct Transform {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Reprojector {
    /// Builds a reprojector between two CRS identifiers (see
    /// [`crs_definition`]). Identical definitions produce an identity
    /// transform.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError`] if either CRS is unknown or invalid.
    pub fn new(from: &str, to: &str) -> Result<Self, ReprojectError> {
        let from = crs_definition(from)?;
        let to = crs_definition(to)?;

        if from == to {
            return Ok(Self::identity());
        }

        let build = |def: &CrsDefinition| {
            Proj4::from_proj_string(&def.proj4)
                .map_err(|e| ReprojectError::Proj(format!("{}: {e}", def.proj4)))
        };

        Ok(Self {
            inner: Some(Transform {
                from: build(&from)?,
                to: build(&to)?,
                from_geographic: from.geographic,
                to_geographic: to.geographic,
            }),
        })
    }

    /// Builds a reprojector from `from` into WGS84.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError`] if `from` is unknown or invalid.
    pub fn to_wgs84(from: &str) -> Result<Self, ReprojectError> {
        Self::new(from, WGS84)
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self { inner: None }
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.inner.is_none()
    }

    /// Transforms a single `x`/`y` coordinate (longitude/latitude in
    /// degrees for geographic systems).
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError::Proj`] if the coordinate cannot be
    /// transformed.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ReprojectError> {
        let Some(t) = &self.inner else {
            return Ok(coord);
        };

        let mut point = if t.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&t.from, &t.to, &mut point).map_err(|e| ReprojectError::Proj(e.to_string()))?;

        Ok(if t.to_geographic {
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        } else {
            Coord {
                x: point.0,
                y: point.1,
            }
        })
    }

    /// Transforms every vertex of `mp`.
    ///
    /// # Errors
    ///
    /// Returns [`ReprojectError::Proj`] on the first vertex that fails.
    pub fn transform_multi_polygon(
        &self,
        mp: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, ReprojectError> {
        if self.is_identity() {
            return Ok(mp.clone());
        }
        mp.try_map_coords(|coord| self.transform_coord(coord))
    }
}
