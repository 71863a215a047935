//! End-to-end run: load, filter, geocode, aggregate, render, publish.
//!
//! Every input comes from an explicit [`AppConfig`] and [`RunOptions`];
//! nothing is read from globals, so a run is reproducible for a fixed
//! "today". Stages execute sequentially and the first fatal error aborts
//! the run.

use std::path::PathBuf;
use std::time::Duration;

use aedes_map_cli_utils::IndicatifProgress;
use aedes_map_config::{AppConfig, GeocodingConfig};
use aedes_map_district::DistrictCounts;
use aedes_map_district::aggregate::DistrictAggregator;
use aedes_map_district::boundaries::load_boundaries;
use aedes_map_facility::{load_facilities, nearby};
use aedes_map_geocoder::Geocoder;
use aedes_map_geocoder::nominatim::NominatimGeocoder;
use aedes_map_geocoder::rate_limit::RateLimiter;
use aedes_map_geocoder::resolve::{GeocodeReport, resolve_missing};
use aedes_map_occurrence::loader::{RecordSchema, load_occurrences};
use aedes_map_occurrence::period::filter_period;
use aedes_map_occurrence::{Occurrence, PeriodSpec};
use aedes_map_publish::{GitPublisher, PublishOutcome};
use aedes_map_render::{MapContent, render_map, write_html};
use chrono::NaiveDate;
use indicatif::MultiProgress;

/// Per-run inputs that do not come from the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub period: PeriodSpec,
    /// Reference date for `--ultimos_dias`.
    pub today: NaiveDate,
}

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub loaded: usize,
    pub filtered: usize,
    pub geocode: Option<GeocodeReport>,
    pub counts: DistrictCounts,
    pub facilities_shown: usize,
    pub output: PathBuf,
    pub published: Option<PublishOutcome>,
}

/// Runs the pipeline, geocoding through Nominatim when enabled.
///
/// # Errors
///
/// Returns an error if any input cannot be loaded, the period parameters
/// are invalid, the map cannot be written, or publishing fails.
pub async fn run(
    config: &AppConfig,
    options: &RunOptions,
    multi: &MultiProgress,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let geocoder = if config.geocoding.enabled {
        Some(NominatimGeocoder::from_config(&config.geocoding.nominatim)?)
    } else {
        None
    };

    run_with_geocoder(
        config,
        options,
        geocoder.as_ref().map(|g| g as &dyn Geocoder),
        multi,
    )
    .await
}

/// Runs the pipeline with an explicit geocoder. Geocoding is skipped when
/// `geocoder` is `None`.
///
/// # Errors
///
/// See [`run`].
#[allow(clippy::future_not_send)]
pub async fn run_with_geocoder(
    config: &AppConfig,
    options: &RunOptions,
    geocoder: Option<&dyn Geocoder>,
    multi: &MultiProgress,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let total_steps = if geocoder.is_some() { 6 } else { 5 };
    let mut current_step = 0;
    let steps = IndicatifProgress::steps_bar(multi, "aedes-map", total_steps);

    // --- Load and filter ---
    current_step += 1;
    log::info!("[{current_step}/{total_steps}] Loading occurrences...");
    let schema = if geocoder.is_some() {
        RecordSchema::Geocodable
    } else {
        RecordSchema::Located
    };
    let records = load_occurrences(&config.inputs.occurrences, schema)?;
    log::info!(
        "Loaded {} record(s) from {}",
        records.len(),
        config.inputs.occurrences.display()
    );

    let filtered = filter_period(&records, &options.period, options.today)?;
    steps.inc(1);

    // --- Geocode ---
    let (filtered, geocode) = match geocoder {
        Some(geocoder) => {
            current_step += 1;
            log::info!("[{current_step}/{total_steps}] Geocoding missing coordinates...");
            let report = geocode_records(&filtered, geocoder, &config.geocoding, multi).await;
            steps.inc(1);
            (report.apply(&filtered), Some(report))
        }
        None => (filtered, None),
    };

    // --- Districts ---
    current_step += 1;
    log::info!("[{current_step}/{total_steps}] Counting occurrences per district...");
    let boundaries = load_boundaries(&config.districts.source)?;
    let aggregator = DistrictAggregator::new(
        &boundaries,
        &config.districts.targets,
        config.districts.buffer,
        config.districts.predicate,
    );
    log::info!(
        "Matched {} of {} target district(s) to boundaries: {}",
        aggregator.indexed_districts(),
        aggregator.target_names().count(),
        aggregator.target_names().collect::<Vec<_>>().join(", ")
    );
    let counts = aggregator.count(&filtered);
    log_counts(&counts);
    steps.inc(1);

    // --- Facilities ---
    current_step += 1;
    log::info!("[{current_step}/{total_steps}] Selecting nearby facilities...");
    let facilities = load_facilities(&config.facilities.path)?;
    let shown = nearby(&facilities, &filtered, config.facilities.radius);
    steps.inc(1);

    // --- Render ---
    current_step += 1;
    log::info!("[{current_step}/{total_steps}] Rendering map...");
    let html = render_map(
        MapContent {
            occurrences: &filtered,
            facilities: &shown,
            counts: &counts,
        },
        &config.map,
        &config.heatmap,
    )?;
    write_html(&config.output.path, &html)?;
    steps.inc(1);

    // --- Publish ---
    current_step += 1;
    let published = if config.publish.enabled {
        log::info!("[{current_step}/{total_steps}] Publishing...");
        let file = std::path::absolute(&config.output.path)?;
        Some(GitPublisher::from_config(&config.publish).publish(&file)?)
    } else {
        log::info!("[{current_step}/{total_steps}] Publishing disabled, skipping");
        None
    };
    steps.inc(1);
    steps.finish(format!("Map written to {}", config.output.path.display()));

    Ok(RunSummary {
        loaded: records.len(),
        filtered: filtered.len(),
        geocode,
        counts,
        facilities_shown: shown.len(),
        output: config.output.path.clone(),
        published,
    })
}

async fn geocode_records(
    records: &[Occurrence],
    geocoder: &dyn Geocoder,
    config: &GeocodingConfig,
    multi: &MultiProgress,
) -> GeocodeReport {
    let nominatim = &config.nominatim;
    let mut limiter =
        RateLimiter::from_millis(nominatim.rate_limit_ms, nominatim.post_request_delay_ms);
    let progress = IndicatifProgress::batch_bar(multi, &format!("Geocoding ({})", geocoder.id()));

    let report = resolve_missing(
        records,
        geocoder,
        &mut limiter,
        Duration::from_secs(nominatim.rate_limited_backoff_secs),
        &progress,
    )
    .await;

    report.log_summary(records);
    report
}

fn log_counts(counts: &DistrictCounts) {
    for row in &counts.rows {
        log::info!("  {:<12} {}", row.name, row.count);
    }
    log::info!("  {:<12} {}", "Total", counts.total());
    if counts.unmatched > 0 {
        log::info!(
            "{} located occurrence(s) outside the target districts",
            counts.unmatched
        );
    }
    if counts.unlocated > 0 {
        log::warn!(
            "{} occurrence(s) without coordinates were not counted",
            counts.unlocated
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use aedes_map_geocoder::{GeocodeError, GeocodedAddress};
    use async_trait::async_trait;
    use indicatif::ProgressDrawTarget;
    use serde_json::json;

    use super::*;

    /// Cambuci west of -46.62, Liberdade east of it.
    fn districts() -> serde_json::Value {
        let square = |x0: f64, x1: f64| {
            json!({
                "type": "Polygon",
                "coordinates": [[[x0, -23.58], [x1, -23.58], [x1, -23.56], [x0, -23.56], [x0, -23.58]]]
            })
        };
        json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "ds_nome": "CAMBUCI" }, "geometry": square(-46.64, -46.62) },
                { "type": "Feature", "properties": { "ds_nome": "LIBERDADE" }, "geometry": square(-46.62, -46.60) }
            ]
        })
    }

    fn facilities() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "nome": "UBS Cambuci", "lat": -23.571, "lon": -46.629 }, "geometry": null },
                { "type": "Feature", "properties": { "nome": "UBS Distante", "lat": -23.90, "lon": -46.90 }, "geometry": null }
            ]
        })
    }

    fn write_json(dir: &Path, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn config(dir: &Path, occurrences: &serde_json::Value, extra: &str) -> AppConfig {
        let occurrences = write_json(dir, "ocorrencias.json", occurrences);
        let districts = write_json(dir, "distritos.geojson", &districts());
        let facilities = write_json(dir, "ubs.geojson", &facilities());
        let output = dir.join("out").join("mapa.html");

        AppConfig::from_overrides(&format!(
            r"
            [inputs]
            occurrences = '{}'

            [districts]
            path = '{}'
            source_crs = 'EPSG:4326'
            targets = ['CAMBUCI', 'ACLIMAÇÃO', 'LIBERDADE']

            [facilities]
            path = '{}'

            [output]
            path = '{}'

            [publish]
            enabled = false
            {extra}
            ",
            occurrences.display(),
            districts.display(),
            facilities.display(),
            output.display(),
        ))
        .unwrap()
    }

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn january() -> RunOptions {
        RunOptions {
            period: PeriodSpec {
                start: Some("2024-01-01".to_string()),
                end: Some("2024-01-31".to_string()),
                last_days: None,
            },
            today: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
        }
    }

    #[tokio::test]
    async fn builds_map_for_the_period() {
        let dir = tempfile::tempdir().unwrap();
        let occurrences = json!([
            { "Data_interacao": "2024-01-05 10:00:00", "Doenca_suspeita": "Dengue", "Latitude": -23.57, "Longitude": -46.63 },
            { "Data_interacao": "2024-01-31 23:59:00", "Doenca_suspeita": "Zika", "Latitude": -23.575, "Longitude": -46.635 },
            { "Data_interacao": "2024-02-01 00:00:00", "Doenca_suspeita": "Dengue", "Latitude": -23.57, "Longitude": -46.61 }
        ]);
        let config = config(dir.path(), &occurrences, "");

        let summary = run(&config, &january(), &hidden()).await.unwrap();

        assert_eq!(summary.loaded, 3);
        assert_eq!(summary.filtered, 2);
        assert!(summary.geocode.is_none());
        assert_eq!(summary.counts.get("CAMBUCI"), Some(2));
        assert_eq!(summary.counts.get("LIBERDADE"), Some(0));
        assert_eq!(summary.counts.get("ACLIMAÇÃO"), Some(0));
        assert_eq!(summary.facilities_shown, 1);
        assert!(summary.published.is_none());

        let html = std::fs::read_to_string(&summary.output).unwrap();
        assert!(html.contains("Dengue (1)"));
        assert!(html.contains("Zika (1)"));
        assert!(html.contains("UBS Cambuci"));
        assert!(!html.contains("UBS Distante"));
    }

    #[tokio::test]
    async fn empty_period_still_writes_a_map() {
        let dir = tempfile::tempdir().unwrap();
        let occurrences = json!([
            { "Data_interacao": "2023-06-01", "Doenca_suspeita": "Dengue", "Latitude": -23.57, "Longitude": -46.63 }
        ]);
        let config = config(dir.path(), &occurrences, "");

        let summary = run(&config, &january(), &hidden()).await.unwrap();

        assert_eq!(summary.filtered, 0);
        assert_eq!(summary.counts.total(), 0);
        assert_eq!(summary.counts.rows.len(), 3);
        assert_eq!(summary.facilities_shown, 0);
        assert!(summary.output.exists());
    }

    #[tokio::test]
    async fn invalid_period_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let occurrences = json!([
            { "Data_interacao": "2024-01-05", "Doenca_suspeita": "Dengue", "Latitude": -23.57, "Longitude": -46.63 }
        ]);
        let config = config(dir.path(), &occurrences, "");
        let options = RunOptions {
            period: PeriodSpec {
                start: Some("05/01/2024".to_string()),
                ..PeriodSpec::default()
            },
            ..january()
        };

        assert!(run(&config, &options, &hidden()).await.is_err());
        assert!(!config.output.path.exists());
    }

    #[tokio::test]
    async fn missing_coordinates_are_fatal_without_geocoding() {
        let dir = tempfile::tempdir().unwrap();
        let occurrences = json!([
            { "Data_interacao": "2024-01-05", "Doenca_suspeita": "Dengue", "Endereco": "Rua Tamandaré, 100" }
        ]);
        let config = config(dir.path(), &occurrences, "");

        assert!(run(&config, &january(), &hidden()).await.is_err());
    }

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
            Ok(query.contains("Tamandaré").then(|| GeocodedAddress {
                latitude: -23.57,
                longitude: -46.61,
                matched_address: Some(query.to_string()),
            }))
        }
    }

    #[tokio::test]
    async fn geocodes_missing_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let occurrences = json!([
            { "Data_interacao": "2024-01-05", "Doenca_suspeita": "Dengue", "Endereco": "Rua Tamandaré, 100" },
            { "Data_interacao": "2024-01-06", "Doenca_suspeita": "Dengue", "Endereco": "Endereço desconhecido" },
            { "Data_interacao": "2024-01-07", "Doenca_suspeita": "Dengue", "Latitude": -23.57, "Longitude": -46.63 }
        ]);
        let config = config(
            dir.path(),
            &occurrences,
            "[geocoding]\nenabled = true\nrate_limit_ms = 0\npost_request_delay_ms = 0",
        );

        let summary = run_with_geocoder(&config, &january(), Some(&FixedGeocoder), &hidden())
            .await
            .unwrap();

        let report = summary.geocode.unwrap();
        assert_eq!(report.located(), 1);
        assert_eq!(report.resolved(), 1);
        assert_eq!(report.unresolved(), 1);
        assert_eq!(summary.counts.get("CAMBUCI"), Some(1));
        assert_eq!(summary.counts.get("LIBERDADE"), Some(1));
        assert_eq!(summary.counts.unlocated, 1);
    }
}
