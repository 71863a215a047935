#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding adapter for occurrence records.
//!
//! Resolves free-text street addresses to latitude/longitude for records
//! that arrive without coordinates. The only provider is Nominatim /
//! `OpenStreetMap`, whose public instance allows **1 request per second**,
//! so every request goes through a [`rate_limit::RateLimiter`].
//!
//! [`resolve::resolve_missing`] never mutates its input. It returns a
//! [`resolve::GeocodeReport`] with one outcome per record, which can then be
//! applied to produce a new, located collection.

pub mod nominatim;
pub mod progress;
pub mod rate_limit;
pub mod resolve;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// A geocoding result with coordinates and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The matched/canonical address returned by the geocoder.
    pub matched_address: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// A service that turns a free-text address into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Short provider identifier used in logs (e.g. `"nominatim"`).
    fn id(&self) -> &str;

    /// Geocodes a single free-form address.
    ///
    /// Returns `Ok(None)` when the provider found no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError>;
}

/// Nominatim settings, deserialized from the `[geocoding]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NominatimConfig {
    /// Search endpoint (e.g. `"https://nominatim.openstreetmap.org/search"`).
    pub base_url: String,
    /// `User-Agent` header; Nominatim's usage policy requires one that
    /// identifies the application.
    pub user_agent: String,
    /// Comma-separated ISO country codes to restrict results to.
    #[serde(default)]
    pub country_codes: Option<String>,
    /// Text appended to every address (e.g. city and state).
    #[serde(default)]
    pub query_suffix: Option<String>,
    /// Minimum delay between request starts in milliseconds.
    pub rate_limit_ms: u64,
    /// Fixed delay after every request, regardless of outcome.
    #[serde(default)]
    pub post_request_delay_ms: u64,
    /// How long to back off after an HTTP 429 response, in seconds.
    #[serde(default = "default_rate_limited_backoff_secs")]
    pub rate_limited_backoff_secs: u64,
    /// HTTP timeout per request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_rate_limited_backoff_secs() -> u64 {
    60
}

const fn default_timeout_secs() -> u64 {
    30
}
