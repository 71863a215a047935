//! Fills in missing coordinates for occurrence records.
//!
//! Records without coordinates are grouped by address so each distinct
//! address is looked up once. Every lookup goes through the rate limiter,
//! and a failed lookup never aborts the pass: the affected records are
//! reported as [`GeocodeOutcome::Unresolved`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use aedes_map_occurrence_models::{Coordinates, Occurrence};

use crate::progress::ProgressCallback;
use crate::rate_limit::RateLimiter;
use crate::{GeocodeError, Geocoder};

/// What happened to a single record during geocoding.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeOutcome {
    /// The record already had coordinates; nothing was looked up.
    Located,
    /// The address resolved to these coordinates.
    Resolved(Coordinates),
    /// The lookup found no match or failed.
    Unresolved(String),
    /// The record has neither coordinates nor an address.
    NoAddress,
}

/// Per-record geocoding outcomes, indexed like the input collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeReport {
    pub outcomes: Vec<GeocodeOutcome>,
}

impl GeocodeReport {
    /// Number of records that were already located.
    #[must_use]
    pub fn located(&self) -> usize {
        self.count(|o| matches!(o, GeocodeOutcome::Located))
    }

    /// Number of records resolved by the geocoder.
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.count(|o| matches!(o, GeocodeOutcome::Resolved(_)))
    }

    /// Number of records left without coordinates after a lookup.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.count(|o| matches!(o, GeocodeOutcome::Unresolved(_)))
    }

    /// Number of records that could not be looked up at all.
    #[must_use]
    pub fn no_address(&self) -> usize {
        self.count(|o| matches!(o, GeocodeOutcome::NoAddress))
    }

    fn count(&self, predicate: impl Fn(&GeocodeOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }

    /// Returns a copy of `records` with resolved coordinates filled in.
    ///
    /// `records` must be the collection this report was produced from.
    /// Records whose outcome is not [`GeocodeOutcome::Resolved`] are copied
    /// unchanged.
    #[must_use]
    pub fn apply(&self, records: &[Occurrence]) -> Vec<Occurrence> {
        debug_assert_eq!(records.len(), self.outcomes.len());

        records
            .iter()
            .zip(&self.outcomes)
            .map(|(record, outcome)| match outcome {
                GeocodeOutcome::Resolved(coords) => Occurrence {
                    coordinates: Some(*coords),
                    ..record.clone()
                },
                _ => record.clone(),
            })
            .collect()
    }

    /// Logs a one-line summary plus each unresolved address at debug level.
    pub fn log_summary(&self, records: &[Occurrence]) {
        log::info!(
            "Geocoding: {} already located, {} resolved, {} unresolved, {} without address",
            self.located(),
            self.resolved(),
            self.unresolved(),
            self.no_address()
        );

        for (record, outcome) in records.iter().zip(&self.outcomes) {
            if let GeocodeOutcome::Unresolved(reason) = outcome {
                log::debug!(
                    "Unresolved address '{}': {reason}",
                    record.address.as_deref().unwrap_or_default()
                );
            }
        }
    }
}

/// Geocodes every record in `records` that lacks coordinates.
///
/// Distinct addresses (after trimming) are looked up once, in first-seen
/// order, each behind `limiter`. After an HTTP 429 the pass pauses for
/// `rate_limited_backoff` before moving on to the next address.
pub async fn resolve_missing(
    records: &[Occurrence],
    geocoder: &dyn Geocoder,
    limiter: &mut RateLimiter,
    rate_limited_backoff: Duration,
    progress: &Arc<dyn ProgressCallback>,
) -> GeocodeReport {
    let mut outcomes: Vec<GeocodeOutcome> = Vec::with_capacity(records.len());
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        if record.coordinates.is_some() {
            outcomes.push(GeocodeOutcome::Located);
            continue;
        }

        match record.address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => {
                outcomes.push(GeocodeOutcome::Unresolved("not attempted".to_string()));
                let entry = groups.entry(address).or_default();
                if entry.is_empty() {
                    order.push(address);
                }
                entry.push(idx);
            }
            _ => outcomes.push(GeocodeOutcome::NoAddress),
        }
    }

    if order.is_empty() {
        return GeocodeReport { outcomes };
    }

    log::info!(
        "Geocoding {} distinct address(es) via {}...",
        order.len(),
        geocoder.id()
    );
    progress.set_total(order.len() as u64);

    for address in order {
        progress.set_message(address.to_string());
        limiter.acquire().await;
        let result = geocoder.geocode(address).await;
        limiter.release().await;

        let outcome = match result {
            Ok(Some(geocoded)) => {
                log::debug!(
                    "{}: '{address}' -> ({}, {})",
                    geocoder.id(),
                    geocoded.latitude,
                    geocoded.longitude
                );
                GeocodeOutcome::Resolved(Coordinates::new(geocoded.latitude, geocoded.longitude))
            }
            Ok(None) => {
                log::debug!("{}: no match for '{address}'", geocoder.id());
                GeocodeOutcome::Unresolved("no match".to_string())
            }
            Err(e) => {
                log::warn!("{} error for '{address}': {e}", geocoder.id());
                if matches!(e, GeocodeError::RateLimited) {
                    log::warn!(
                        "Rate limited by {}, waiting {}s...",
                        geocoder.id(),
                        rate_limited_backoff.as_secs()
                    );
                    tokio::time::sleep(rate_limited_backoff).await;
                }
                GeocodeOutcome::Unresolved(e.to_string())
            }
        };

        if let Some(indices) = groups.get(address) {
            for &idx in indices {
                outcomes[idx] = outcome.clone();
            }
        }
        progress.inc(1);
    }

    progress.finish("Geocoding complete".to_string());
    GeocodeReport { outcomes }
}
