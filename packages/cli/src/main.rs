#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `aedes_map`: builds the arbovirus occurrence heatmap for a reporting
//! period and publishes it.
//!
//! Uses `indicatif-log-bridge` (via [`aedes_map_cli_utils::init_logger`])
//! so that log lines and the geocoding progress bar share the terminal.

mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use aedes_map_config::{AppConfig, config_path_from_env};
use aedes_map_occurrence::PeriodSpec;
use aedes_map_publish::PublishOutcome;
use clap::Parser;

use crate::pipeline::RunOptions;

#[derive(Parser)]
#[command(
    name = "aedes_map",
    about = "Heatmap of dengue, zika and chikungunya reports per district"
)]
struct Cli {
    /// First day to include (YYYY-MM-DD)
    #[arg(long = "inicio", value_name = "YYYY-MM-DD")]
    start: Option<String>,

    /// Last day to include, inclusive (YYYY-MM-DD)
    #[arg(long = "fim", value_name = "YYYY-MM-DD")]
    end: Option<String>,

    /// Only the last N days, ending today. Overrides --inicio/--fim
    #[arg(long = "ultimos_dias", value_name = "N")]
    last_days: Option<u32>,

    /// TOML file overriding the built-in configuration (also read from
    /// `AEDES_MAP_CONFIG`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Geocode records that have an address but no coordinates
    #[arg(long)]
    geocode: bool,

    /// Where to write the HTML map
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not commit and push the generated map
    #[arg(long)]
    no_publish: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = aedes_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = AppConfig::load(config_path_from_env(cli.config).as_deref())?;
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    if cli.geocode {
        config.geocoding.enabled = true;
    }
    if cli.no_publish {
        config.publish.enabled = false;
    }

    let options = RunOptions {
        period: PeriodSpec {
            start: cli.start,
            end: cli.end,
            last_days: cli.last_days,
        },
        today: chrono::Local::now().date_naive(),
    };

    let started = Instant::now();
    let summary = pipeline::run(&config, &options, &multi).await?;

    log::info!(
        "Done in {:.1}s: {} of {} record(s) in period, {} counted in target districts, map at {}",
        started.elapsed().as_secs_f64(),
        summary.filtered,
        summary.loaded,
        summary.counts.total(),
        summary.output.display()
    );
    if let Some(report) = &summary.geocode {
        log::info!(
            "Geocoded {} record(s), {} unresolved",
            report.resolved(),
            report.unresolved()
        );
    }
    log::info!("{} facilit(ies) shown", summary.facilities_shown);
    match summary.published {
        Some(PublishOutcome::Pushed) => log::info!("Map published"),
        Some(PublishOutcome::Unchanged) => log::info!("Map unchanged, nothing published"),
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_period_flags() {
        let cli = Cli::try_parse_from([
            "aedes_map",
            "--inicio",
            "2024-01-01",
            "--fim",
            "2024-01-31",
            "--no-publish",
        ])
        .unwrap();
        assert_eq!(cli.start.as_deref(), Some("2024-01-01"));
        assert_eq!(cli.end.as_deref(), Some("2024-01-31"));
        assert_eq!(cli.last_days, None);
        assert!(cli.no_publish);
        assert!(!cli.geocode);
    }

    #[test]
    fn parses_last_days() {
        let cli = Cli::try_parse_from(["aedes_map", "--ultimos_dias", "7", "--geocode"]).unwrap();
        assert_eq!(cli.last_days, Some(7));
        assert!(cli.geocode);
    }

    #[test]
    fn rejects_negative_last_days() {
        assert!(Cli::try_parse_from(["aedes_map", "--ultimos_dias", "-3"]).is_err());
    }
}
