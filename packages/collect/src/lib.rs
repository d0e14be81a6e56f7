#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collection pipeline: stage engine, stage definitions and orchestrator.
//!
//! Every stage follows the same shape: enumerate API calls, fetch each one
//! with bounded retries, parse rows into per-district contributions in a
//! local accumulator, then persist each accumulated district once. The
//! stages differ only in their [`engine::Stage`] definition and in whether
//! they may create records.

pub mod business;
pub mod engine;
pub mod income;
pub mod orchestrator;
pub mod sales;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::Collector;

/// Configuration problems that fail a stage before any API call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// The request named no city.
    #[error("No cities requested")]
    NoCities,

    /// The request named no area code.
    #[error("No area codes requested")]
    NoAreaCodes,

    /// None of the requested cities has a grid box.
    #[error("No grid boxes configured for cities: {}", .0.join(", "))]
    NoBoxes(Vec<String>),

    /// The registry has no category codes for this stage.
    #[error("No category codes configured")]
    NoCategories,

    /// The business/population stage was asked to fetch nothing.
    #[error("Neither business counts nor population data requested")]
    NothingRequested,
}

/// Problems with an integrated collection request as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    /// Every stage toggle was off.
    #[error("No collection stage enabled")]
    NoStagesEnabled,
}
