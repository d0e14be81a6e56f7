#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Client boundary for the public statistical APIs.
//!
//! The collectors talk to the outside world only through the
//! [`StatsSource`] trait: one method per API family, each returning the
//! raw rows of a single call. [`http::HttpStatsSource`] is the production
//! implementation; tests substitute scripted stubs.

pub mod endpoints;
pub mod http;
pub mod parsing;
pub mod progress;
pub mod retry;

use async_trait::async_trait;
use district_stats_geography_models::GeoBox;
use district_stats_source_models::{
    AmountRow, ApiFamily, FloatingPopulationRow, ResidentRow, SalesRow, WorkerRow,
};

/// Errors that can occur while calling a statistical API.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status code.
    #[error("{family} endpoint returned HTTP {status}")]
    Status {
        /// Which API was called.
        family: ApiFamily,
        /// The HTTP status code.
        status: u16,
    },

    /// The response envelope reported a failure.
    #[error("{family} endpoint returned result code {result_code:?}: {message}")]
    Unsuccessful {
        /// Which API was called.
        family: ApiFamily,
        /// The `resultCode` value.
        result_code: String,
        /// The `resultMsg` value, if any.
        message: String,
    },

    /// A decoded response did not have the row structure expected for its
    /// family.
    #[error("{family} response has unexpected shape: {source}")]
    Shape {
        /// Which API was called.
        family: ApiFamily,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// No endpoint is configured for an API family.
    #[error("No endpoint configured for {0}")]
    MissingEndpoint(ApiFamily),

    /// A field in an otherwise well-formed row could not be parsed.
    #[error("Cannot parse {field} value {value:?}")]
    Parse {
        /// Wire name of the field.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// One call per API family against the statistical service.
///
/// Each method performs exactly one logical request and returns the raw
/// rows. Retry and rate limiting are the caller's concern.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Sales and store counts for one category inside one grid box.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or decode failure.
    async fn sales(&self, geo_box: &GeoBox, category_code: &str)
    -> Result<Vec<SalesRow>, SourceError>;

    /// Consumption totals inside one grid box.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or decode failure.
    async fn consumption(&self, geo_box: &GeoBox) -> Result<Vec<AmountRow>, SourceError>;

    /// Income totals inside one grid box.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status or decode failure.
    async fn income(&self, geo_box: &GeoBox) -> Result<Vec<AmountRow>, SourceError>;

    /// Business counts for one category plus floating population, for every
    /// sub-area of `area_code`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, envelope or decode
    /// failure.
    async fn floating_population(
        &self,
        area_code: &str,
        category_code: &str,
    ) -> Result<Vec<FloatingPopulationRow>, SourceError>;

    /// Households and residential population for every sub-area of
    /// `area_code`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, envelope or decode
    /// failure.
    async fn residents(&self, area_code: &str) -> Result<Vec<ResidentRow>, SourceError>;

    /// Working population for every sub-area of `area_code`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, envelope or decode
    /// failure.
    async fn workers(&self, area_code: &str) -> Result<Vec<WorkerRow>, SourceError>;
}
