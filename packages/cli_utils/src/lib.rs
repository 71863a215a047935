#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the `aedes_map` binary.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines printed during geocoding do not tear
//! the progress bar. [`IndicatifProgress`] adapts an `indicatif` bar to the
//! geocoder's [`ProgressCallback`].

use std::sync::Arc;
use std::time::Duration;

use aedes_map_geocoder::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// A terminal progress bar behind the geocoder's [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied by `set_total()`, once the length is known.
    counted: ProgressStyle,
}

impl IndicatifProgress {
    /// One tick per pipeline stage.
    #[must_use]
    pub fn steps_bar(
        multi: &MultiProgress,
        message: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::steps(multi, message, total))
    }

    /// Spinner for the geocoding pass; becomes a bar with an ETA once the
    /// number of distinct addresses is set. The message shows the address
    /// being looked up.
    #[must_use]
    pub fn batch_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::batch(multi, message))
    }

    fn steps(multi: &MultiProgress, message: &str, total: u64) -> Self {
        let counted = style("{msg:>12.bold} [{bar:30.green/dim}] {pos}/{len} {elapsed}");
        let bar = multi.add(ProgressBar::new(total).with_style(counted.clone()));
        bar.set_message(message.to_string());

        Self { bar, counted }
    }

    fn batch(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.yellow} {prefix} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        ));
        bar.set_prefix(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));

        let counted = style("{prefix} [{bar:30.yellow/dim}] {pos}/{len} eta {eta} {wide_msg}");

        Self { bar, counted }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.counted.clone());
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Honors `RUST_LOG`; defaults to `info` when it is unset.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    let logger = builder.build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
