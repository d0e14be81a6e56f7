//! Endpoint registry, loaded from the embedded `endpoints.toml`.
//!
//! The base URL can be swapped at runtime through
//! [`BASE_URL_ENV`] so the same binary can point at a mirror or a local
//! fake server.

use std::collections::BTreeMap;
use std::time::Duration;

use district_stats_source_models::ApiFamily;
use serde::Deserialize;

use crate::SourceError;

/// Environment variable overriding the configured base URL.
pub const BASE_URL_ENV: &str = "DISTRICT_STATS_API_BASE_URL";

const ENDPOINTS_TOML: &str = include_str!("../endpoints.toml");

/// One API endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    /// Which API family this endpoint serves.
    pub family: ApiFamily,
    /// Path appended to the base URL.
    pub path: String,
    /// Fixed query parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// All endpoints plus shared connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Scheme and host shared by every endpoint.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Configured endpoints.
    pub endpoints: Vec<Endpoint>,
}

impl EndpointConfig {
    /// Loads the embedded configuration and applies the [`BASE_URL_ENV`]
    /// override, if set.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `endpoints.toml` is malformed.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::embedded();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV)
            && !base_url.trim().is_empty()
        {
            log::info!("Using API base URL override {base_url}");
            config.base_url = base_url.trim().to_string();
        }
        config
    }

    /// Loads the embedded configuration as-is.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `endpoints.toml` is malformed.
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(ENDPOINTS_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse endpoints.toml: {e}"))
    }

    /// Returns the endpoint serving `family`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::MissingEndpoint`] if none is configured.
    pub fn endpoint(&self, family: ApiFamily) -> Result<&Endpoint, SourceError> {
        self.endpoints
            .iter()
            .find(|e| e.family == family)
            .ok_or(SourceError::MissingEndpoint(family))
    }

    /// Full URL for `endpoint`.
    #[must_use]
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        )
    }

    /// The per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_has_an_endpoint() {
        let config = EndpointConfig::embedded();
        for family in ApiFamily::ALL {
            assert!(config.endpoint(*family).is_ok(), "missing {family}");
        }
        assert_eq!(config.endpoints.len(), ApiFamily::ALL.len());
    }

    #[test]
    fn area_endpoints_use_expected_category_granularity() {
        let config = EndpointConfig::embedded();
        let floating = config.endpoint(ApiFamily::FloatingPopulation).unwrap();
        assert_eq!(floating.params["upjongGb"], "2");
        assert_eq!(floating.params["areaGb"], "1");
        assert_eq!(floating.params["sprTypeNo"], "1");
        for family in [ApiFamily::Residents, ApiFamily::Workers] {
            assert_eq!(config.endpoint(family).unwrap().params["upjongGb"], "0");
        }
    }

    #[test]
    fn joins_urls_without_double_slashes() {
        let mut config = EndpointConfig::embedded();
        config.base_url = "http://localhost:8080/".to_string();
        let endpoint = config.endpoint(ApiFamily::Sales).unwrap().clone();
        assert_eq!(
            config.url(&endpoint),
            "http://localhost:8080/gis/api/getMapSaleInfo.json"
        );
    }
}
