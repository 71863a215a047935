//! Per-district occurrence counts.
//!
//! Only boundaries whose normalized name is in the target list are indexed.
//! Each located occurrence is matched against them with the configured
//! [`JoinPredicate`]; occurrences matching nothing fall into the
//! `unmatched` bucket, which is not part of the table. Under
//! [`JoinPredicate::Intersects`] an occurrence on a shared boundary is
//! counted once for each district it touches.

use std::collections::BTreeMap;

use aedes_map_district_models::{DistrictBoundary, DistrictCount, DistrictCounts};
use aedes_map_occurrence_models::Occurrence;
use aedes_map_spatial::{DistrictIndex, JoinPredicate};
use geo::MultiPolygon;

use crate::normalize::normalize_name;

struct Target {
    display: String,
    normalized: String,
}

/// Counts occurrences per target district.
pub struct DistrictAggregator {
    targets: Vec<Target>,
    index: DistrictIndex,
    /// Index entry id -> position in `targets`.
    entry_targets: Vec<usize>,
    predicate: JoinPredicate,
}

impl DistrictAggregator {
    /// Builds the aggregator from loaded boundaries and the target list.
    ///
    /// Target names are normalized before matching; duplicates (after
    /// normalization) keep their first spelling. Several boundaries with
    /// the same normalized name are merged into one district.
    #[must_use]
    pub fn new(
        boundaries: &[DistrictBoundary],
        targets: &[String],
        buffer: f64,
        predicate: JoinPredicate,
    ) -> Self {
        let mut unique: Vec<Target> = Vec::with_capacity(targets.len());
        for display in targets {
            let normalized = normalize_name(display);
            if !unique.iter().any(|t| t.normalized == normalized) {
                unique.push(Target {
                    display: display.clone(),
                    normalized,
                });
            }
        }

        let mut polygons: BTreeMap<usize, MultiPolygon<f64>> = BTreeMap::new();
        for boundary in boundaries {
            if let Some(pos) = unique
                .iter()
                .position(|t| t.normalized == boundary.normalized_name)
            {
                polygons
                    .entry(pos)
                    .or_insert_with(|| MultiPolygon(Vec::new()))
                    .0
                    .extend(boundary.geometry.0.iter().cloned());
            }
        }

        for (pos, target) in unique.iter().enumerate() {
            if !polygons.contains_key(&pos) {
                log::warn!(
                    "Target district '{}' not found in boundary data; it will count zero",
                    target.display
                );
            }
        }

        let entry_targets: Vec<usize> = polygons.keys().copied().collect();
        let index = DistrictIndex::new(
            polygons
                .into_iter()
                .map(|(pos, mp)| (unique[pos].normalized.clone(), mp))
                .collect(),
            buffer,
        );

        Self {
            targets: unique,
            index,
            entry_targets,
            predicate,
        }
    }

    /// Target display names, in output order.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.display.as_str())
    }

    /// Number of target districts that have boundary polygons.
    #[must_use]
    pub fn indexed_districts(&self) -> usize {
        self.index.len()
    }

    /// Counts `records` per target district.
    ///
    /// The result always has one row per target, in target order.
    #[must_use]
    pub fn count(&self, records: &[Occurrence]) -> DistrictCounts {
        let mut counts = vec![0_u64; self.targets.len()];
        let mut unmatched = 0_u64;
        let mut unlocated = 0_u64;

        if self.index.is_empty() && !records.is_empty() {
            log::warn!(
                "No target district has boundary polygons; every located record is unmatched"
            );
        }

        for record in records {
            let Some(coords) = record.coordinates else {
                unlocated += 1;
                continue;
            };

            let matches = self
                .index
                .lookup(coords.longitude, coords.latitude, self.predicate);
            if matches.is_empty() {
                unmatched += 1;
                continue;
            }
            if matches.len() > 1 {
                log::debug!(
                    "({}, {}) counted in {}",
                    coords.latitude,
                    coords.longitude,
                    matches
                        .iter()
                        .map(|&id| self.index.name(id))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            for id in matches {
                counts[self.entry_targets[id]] += 1;
            }
        }

        DistrictCounts {
            rows: self
                .targets
                .iter()
                .zip(counts)
                .map(|(t, count)| DistrictCount {
                    name: t.display.clone(),
                    count,
                })
                .collect(),
            unmatched,
            unlocated,
        }
    }
}

/// Builds a [`DistrictAggregator`] and counts `records` in one step.
#[must_use]
pub fn count_by_district(
    records: &[Occurrence],
    boundaries: &[DistrictBoundary],
    targets: &[String],
    buffer: f64,
    predicate: JoinPredicate,
) -> DistrictCounts {
    DistrictAggregator::new(boundaries, targets, buffer, predicate).count(records)
}
