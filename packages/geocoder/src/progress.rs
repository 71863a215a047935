//! Progress reporting for the geocoding pass.
//!
//! Geocoding is the only long-running step of a run (one request per second
//! per unique address). The terminal implementation lives in
//! `aedes_map_cli_utils`; library callers and tests use [`null_progress`].

use std::sync::Arc;

/// Receives progress updates from a long-running pass.
pub trait ProgressCallback: Send + Sync {
    /// Number of units the pass will process.
    fn set_total(&self, total: u64);

    /// `delta` more units are done.
    fn inc(&self, delta: u64);

    /// Text shown next to the indicator, e.g. the current address.
    fn set_message(&self, msg: String);

    /// The pass is over.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _: u64) {}
    fn inc(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
