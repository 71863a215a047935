#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Application configuration.
//!
//! Defaults are compiled in from `config/default.toml`. A user file, given
//! on the command line or through the `AEDES_MAP_CONFIG` environment
//! variable, is merged over them table by table, so it only needs the keys
//! it changes. Relative paths are resolved against the working directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use aedes_map_district_models::DistrictSource;
use aedes_map_geocoder::NominatimConfig;
use aedes_map_publish::PublishConfig;
use aedes_map_render::{HeatmapStyle, MapOptions};
use aedes_map_spatial::JoinPredicate;
use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};

/// Environment variable naming a user config file.
pub const CONFIG_ENV_VAR: &str = "AEDES_MAP_CONFIG";

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The user config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The user config is not valid TOML or has the wrong shape.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputsConfig {
    /// Occurrence records (`.json` or `.csv`).
    pub occurrences: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DistrictsConfig {
    #[serde(flatten)]
    pub source: DistrictSource,
    /// Districts shown in the summary table, in display order.
    pub targets: Vec<String>,
    /// Point buffer in degrees.
    pub buffer: f64,
    pub predicate: JoinPredicate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FacilitiesConfig {
    pub path: PathBuf,
    /// Proximity radius in degrees.
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeocodingConfig {
    /// Resolve missing coordinates from the address field.
    pub enabled: bool,
    #[serde(flatten)]
    pub nominatim: NominatimConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub inputs: InputsConfig,
    pub districts: DistrictsConfig,
    pub facilities: FacilitiesConfig,
    pub geocoding: GeocodingConfig,
    pub map: MapOptions,
    pub heatmap: HeatmapStyle,
    pub output: OutputConfig,
    pub publish: PublishConfig,
}

impl AppConfig {
    /// The compiled-in defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `default.toml` is malformed, which is a build
    /// defect caught by this crate's tests.
    #[must_use]
    pub fn defaults() -> Self {
        Value::Table(default_table())
            .try_into()
            .unwrap_or_else(|e| panic!("Failed to parse embedded default.toml: {e}"))
    }

    /// Loads the defaults merged with the user file at `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the user file cannot be read or does not
    /// produce a valid configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::defaults());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_overrides(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Merges TOML `overrides` over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if `overrides` is not valid TOML or
    /// the merged result is not a valid configuration.
    pub fn from_overrides(overrides: &str) -> Result<Self, ConfigError> {
        let user: Table = toml::from_str(overrides)?;
        let mut merged = default_table();
        merge_tables(&mut merged, user);
        Ok(Value::Table(merged).try_into()?)
    }
}

/// Picks the user config path: the command-line value wins over the
/// environment variable. Empty values are ignored.
#[must_use]
pub fn resolve_config_path(cli: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    cli.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

/// Reads [`CONFIG_ENV_VAR`] and combines it with the command-line value.
#[must_use]
pub fn config_path_from_env(cli: Option<PathBuf>) -> Option<PathBuf> {
    resolve_config_path(cli, std::env::var_os(CONFIG_ENV_VAR))
}

fn default_table() -> Table {
    toml::from_str(DEFAULT_CONFIG)
        .unwrap_or_else(|e| panic!("Failed to parse embedded default.toml: {e}"))
}

/// Recursively merges `overlay` into `base`. Nested tables merge key by
/// key; any other value replaces the base value.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                merge_tables(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = AppConfig::defaults();
        assert_eq!(
            config.districts.targets,
            vec!["CAMBUCI", "ACLIMAÇÃO", "LIBERDADE", "IPIRANGA"]
        );
        assert_eq!(config.districts.source.name_field, "ds_nome");
        assert_eq!(config.districts.source.source_crs, "EPSG:31983");
        assert_eq!(config.districts.predicate, JoinPredicate::Intersects);
        assert!((config.districts.buffer - 0.0001).abs() < f64::EPSILON);
        assert!((config.facilities.radius - 0.02).abs() < f64::EPSILON);
        assert!(!config.geocoding.enabled);
        assert_eq!(config.geocoding.nominatim.rate_limit_ms, 1000);
        assert_eq!(config.output.path, PathBuf::from("mapa_calor_ubs.html"));
        assert_eq!(config.publish.message, "Atualizando mapa de calor");
        assert_eq!(config.publish.branch, None);
    }

    #[test]
    fn embedded_styles_match_render_defaults() {
        let config = AppConfig::defaults();
        assert_eq!(config.heatmap, HeatmapStyle::default());
        assert_eq!(config.map.default_center, MapOptions::default().default_center);
        assert_eq!(config.map.zoom, 13);
        assert_eq!(config.map.title, MapOptions::default().title);
    }

    #[test]
    fn overrides_merge_key_by_key() {
        let config = AppConfig::from_overrides(
            r##"
            [districts]
            predicate = "within"
            targets = ["SÉ"]

            [heatmap.gradient]
            "1.0" = "#800000"

            [publish]
            enabled = false
            "##,
        )
        .unwrap();

        assert_eq!(config.districts.predicate, JoinPredicate::Within);
        assert_eq!(config.districts.targets, vec!["SÉ"]);
        assert_eq!(config.districts.source.name_field, "ds_nome");
        assert_eq!(config.heatmap.gradient.len(), 4);
        assert_eq!(config.heatmap.gradient["1.0"], "#800000");
        assert_eq!(config.heatmap.gradient["0.2"], "#3a7ee7");
        assert!(!config.publish.enabled);
        assert_eq!(config.publish.remote, "origin");
    }

    #[test]
    fn empty_overrides_equal_defaults() {
        assert_eq!(AppConfig::from_overrides("").unwrap(), AppConfig::defaults());
    }

    #[test]
    fn malformed_overrides_are_errors() {
        assert!(matches!(
            AppConfig::from_overrides("[districts"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AppConfig::from_overrides("[districts]\npredicate = \"touches\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_user_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\npath = \"public/index.html\"").unwrap();
        file.flush().unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.output.path, PathBuf::from("public/index.html"));
    }

    #[test]
    fn missing_user_file_is_an_error() {
        assert!(matches!(
            AppConfig::load(Some(Path::new("/nonexistent/aedes-map.toml"))),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn cli_path_wins_over_environment() {
        assert_eq!(
            resolve_config_path(Some("a.toml".into()), Some("b.toml".into())),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            resolve_config_path(None, Some("b.toml".into())),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(resolve_config_path(None, Some(OsString::new())), None);
        assert_eq!(resolve_config_path(None, None), None);
    }
}
