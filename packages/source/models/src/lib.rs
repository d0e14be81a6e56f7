#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raw response row types for the public statistical APIs.
//!
//! Field names follow the wire format (`admCd`, `saleAmt`, ...). Every
//! scalar is kept as a string because the APIs mix JSON strings, numbers
//! and `null` for the same field; parsing into typed values happens in
//! `district_stats_source::parsing`.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Result code signalling a successful area-oriented API response.
pub const RESULT_CODE_SUCCESS: &str = "SUCCESS";

/// The statistical API families the collectors call.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApiFamily {
    /// Per-box, per-category sales and store counts.
    Sales,
    /// Per-box consumption totals.
    Consumption,
    /// Per-box income totals.
    Income,
    /// Per-area business counts and floating population.
    FloatingPopulation,
    /// Per-area households and residential population.
    Residents,
    /// Per-area working population.
    Workers,
}

impl ApiFamily {
    /// Every family, in collection order.
    pub const ALL: &[Self] = &[
        Self::Sales,
        Self::Consumption,
        Self::Income,
        Self::FloatingPopulation,
        Self::Residents,
        Self::Workers,
    ];
}

/// Deserializes a string, number, boolean or `null` into a `String`.
/// `null` and missing values become the empty string.
///
/// # Errors
///
/// Returns an error for arrays and objects.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, got {other}"
        ))),
    }
}

/// One row of the sales API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRow {
    /// Store count, possibly with thousands separators.
    #[serde(default, deserialize_with = "lenient_string")]
    pub store_cnt: String,
    /// Sales amount in units of 10,000, possibly with thousands separators.
    #[serde(default, deserialize_with = "lenient_string")]
    pub sale_amt: String,
    /// Admin-dong code.
    #[serde(default, deserialize_with = "lenient_string")]
    pub adm_cd: String,
    /// Admin-dong name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub adm_nm: String,
}

/// One row of the consumption or income API response.
///
/// The two endpoints differ only in the name of the amount field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRow {
    /// Amount in units of 10,000 (`wholCnsmpAmt` or `wholEarnAmt`).
    #[serde(
        default,
        alias = "wholCnsmpAmt",
        alias = "wholEarnAmt",
        deserialize_with = "lenient_string"
    )]
    pub amount: String,
    /// Admin-dong code.
    #[serde(default, deserialize_with = "lenient_string")]
    pub adm_cd: String,
    /// Admin-dong name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub adm_nm: String,
}

/// One row of `dynpplStatsList` (business count and floating population).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingPopulationRow {
    /// Area name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_nm: String,
    /// Area granularity marker.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_gb: String,
    /// Area code (8+ digits at district level).
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_cd: String,
    /// Business (store) count for the queried category.
    #[serde(default, deserialize_with = "lenient_string")]
    pub upso_cnt: String,
    /// Floating population.
    #[serde(default, deserialize_with = "lenient_string")]
    pub dyn_popnum: String,
}

/// One row of `rgnStatsList` (households and residential population).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentRow {
    /// Area name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_nm: String,
    /// Area code.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_cd: String,
    /// Household count.
    #[serde(default, deserialize_with = "lenient_string")]
    pub hous: String,
    /// Residential population.
    #[serde(default, deserialize_with = "lenient_string")]
    pub pop: String,
}

/// One row of `wrcpplStatsList` (working population).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRow {
    /// Area name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_nm: String,
    /// Area code.
    #[serde(default, deserialize_with = "lenient_string")]
    pub area_cd: String,
    /// Working population.
    #[serde(default, deserialize_with = "lenient_string")]
    pub wrc_popnum: String,
}

/// The `data` object of an area-oriented API response. Only the list
/// matching the called endpoint is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStatsData {
    /// Business count and floating population rows.
    #[serde(default)]
    pub dynppl_stats_list: Vec<FloatingPopulationRow>,
    /// Household and residential population rows.
    #[serde(default)]
    pub rgn_stats_list: Vec<ResidentRow>,
    /// Working population rows.
    #[serde(default)]
    pub wrcppl_stats_list: Vec<WorkerRow>,
}

/// Envelope wrapping every area-oriented API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStatsEnvelope {
    /// `"SUCCESS"` on success.
    #[serde(default, deserialize_with = "lenient_string")]
    pub result_code: String,
    /// Optional human-readable message.
    #[serde(default)]
    pub result_msg: Option<String>,
    /// Payload; absent on failure.
    #[serde(default)]
    pub data: Option<AreaStatsData>,
}

impl AreaStatsEnvelope {
    /// Whether the API reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result_code == RESULT_CODE_SUCCESS
    }
}
