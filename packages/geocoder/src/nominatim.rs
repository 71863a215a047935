//! Nominatim / `OpenStreetMap` geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance. This client does not pace itself; callers go
//! through [`crate::rate_limit::RateLimiter`].
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::Duration;

use async_trait::async_trait;

use crate::{GeocodeError, GeocodedAddress, Geocoder, NominatimConfig};

/// A Nominatim free-form search client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    country_codes: Option<String>,
    query_suffix: Option<String>,
}

impl NominatimGeocoder {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            country_codes: config.country_codes.clone(),
            query_suffix: config.query_suffix.clone(),
        })
    }

    /// The full query sent for `address`, including the configured suffix.
    #[must_use]
    pub fn build_query(&self, address: &str) -> String {
        build_query(address, self.query_suffix.as_deref())
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn id(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        let full_query = self.build_query(query);

        let mut params = vec![("q", full_query.as_str()), ("format", "jsonv2"), ("limit", "1")];
        if let Some(codes) = self.country_codes.as_deref() {
            params.push(("countrycodes", codes));
        }

        let resp = self.client.get(&self.base_url).query(&params).send().await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_response(&body)
    }
}

/// Appends `suffix` to `address` unless the address already ends with it.
fn build_query(address: &str, suffix: Option<&str>) -> String {
    let address = address.trim();
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        Some(suffix) if !address.to_lowercase().ends_with(&suffix.to_lowercase()) => {
            format!("{address}, {suffix}")
        }
        _ => address.to_string(),
    }
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let lon = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    let display_name = first["display_name"].as_str().map(String::from);

    Ok(Some(GeocodedAddress {
        latitude: lat,
        longitude: lon,
        matched_address: display_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "-23.5574",
            "lon": "-46.6355",
            "display_name": "Rua Galvão Bueno, Liberdade, São Paulo, Brasil"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - -23.5574).abs() < 1e-4);
        assert!((result.longitude - -46.6355).abs() < 1e-4);
        assert_eq!(
            result.matched_address.as_deref(),
            Some("Rua Galvão Bueno, Liberdade, São Paulo, Brasil")
        );
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_non_array_body() {
        let body = serde_json::json!({"error": "bad request"});
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_missing_coordinates() {
        let body = serde_json::json!([{ "lat": "-23.5" }]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn appends_query_suffix_once() {
        assert_eq!(
            build_query(" Rua Vergueiro, 1000 ", Some("São Paulo, SP")),
            "Rua Vergueiro, 1000, São Paulo, SP"
        );
        assert_eq!(
            build_query("Rua Vergueiro, 1000, são paulo, sp", Some("São Paulo, SP")),
            "Rua Vergueiro, 1000, são paulo, sp"
        );
        assert_eq!(build_query("Rua A", None), "Rua A");
        assert_eq!(build_query("Rua A", Some("  ")), "Rua A");
    }
}
