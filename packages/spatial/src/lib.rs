#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for district attribution.
//!
//! District polygons are loaded once into an R-tree and queried per
//! occurrence point. Points are matched with a small buffer so that cases
//! reported exactly on a shared boundary (digitization or floating-point
//! error) are not dropped. [`reproject`] converts boundary datasets from
//! their projected CRS into WGS84 longitude/latitude before indexing.

pub mod reproject;

use geo::{BoundingRect, Contains, Distance, Euclidean, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

/// Default buffer around each point, in degrees (about 11 meters at the
/// equator).
pub const DEFAULT_BUFFER_DEGREES: f64 = 0.0001;

/// How an occurrence point is matched against district polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPredicate {
    /// The buffered point intersects the polygon. A point near a shared
    /// boundary can match several districts.
    #[default]
    Intersects,
    /// The unbuffered point lies strictly inside the polygon. At most one
    /// district matches (the first indexed one).
    Within,
}

/// A district polygon stored in the R-tree.
struct DistrictEntry {
    id: usize,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for DistrictEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of district polygons in WGS84 longitude/latitude.
///
/// Districts are identified by their insertion index; [`Self::name`] maps
/// an index back to the district name.
pub struct DistrictIndex {
    tree: RTree<DistrictEntry>,
    names: Vec<String>,
    buffer: f64,
}

impl DistrictIndex {
    /// Builds the index. `buffer` is the point tolerance in degrees used by
    /// [`JoinPredicate::Intersects`].
    #[must_use]
    pub fn new(districts: Vec<(String, MultiPolygon<f64>)>, buffer: f64) -> Self {
        let mut names = Vec::with_capacity(districts.len());
        let mut entries = Vec::with_capacity(districts.len());

        for (id, (name, polygon)) in districts.into_iter().enumerate() {
            names.push(name);
            entries.push(DistrictEntry {
                id,
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        log::debug!("Indexed {} district polygon(s)", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
            names,
            buffer: buffer.max(0.0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the district with index `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not returned by this index.
    #[must_use]
    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    /// Districts matching the point under `predicate`, in ascending index
    /// order.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64, predicate: JoinPredicate) -> Vec<usize> {
        match predicate {
            JoinPredicate::Intersects => self.lookup_intersecting(lng, lat),
            JoinPredicate::Within => self.lookup_within(lng, lat).into_iter().collect(),
        }
    }

    /// All districts whose polygon lies within `buffer` degrees of the
    /// point (equivalently: that intersect the buffered point).
    #[must_use]
    pub fn lookup_intersecting(&self, lng: f64, lat: f64) -> Vec<usize> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_corners(
            [lng - self.buffer, lat - self.buffer],
            [lng + self.buffer, lat + self.buffer],
        );

        let mut ids: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| Euclidean.distance(&point, &entry.polygon) <= self.buffer)
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The lowest-indexed district strictly containing the point.
    #[must_use]
    pub fn lookup_within(&self, lng: f64, lat: f64) -> Option<usize> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.id)
            .min()
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
