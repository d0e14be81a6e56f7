#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-district analysis record types.
//!
//! An [`AdminDongRecord`] is the persisted analysis unit, keyed by its
//! administrative district (admin-dong) code. The sales stage creates
//! records; every other stage only enriches records that already exist.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum number of decimal digits in a district-level admin-dong code.
///
/// Shorter codes denote city or ward aggregates.
pub const DISTRICT_LEVEL_MIN_DIGITS: u32 = 8;

/// Parses an admin code as sent by the statistical APIs.
///
/// Returns `None` for empty strings, the literal `"null"`, or anything that
/// is not a plain run of ASCII digits.
#[must_use]
pub fn parse_admin_code(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Number of decimal digits in `code`.
#[must_use]
pub const fn digit_count(code: i64) -> u32 {
    match code.checked_ilog10() {
        Some(log) => log + 1,
        None => 1,
    }
}

/// Returns `true` if `code` denotes the finest (district) granularity.
#[must_use]
pub const fn is_district_level(code: i64) -> bool {
    code > 0 && digit_count(code) >= DISTRICT_LEVEL_MIN_DIGITS
}

/// Store count and sales amount for one category in one district.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesFigures {
    /// Number of stores reporting sales.
    pub store_count: i64,
    /// Sales amount in currency units (already scaled).
    pub sales_amount: i64,
}

/// The persisted per-district analysis record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDongRecord {
    /// Admin-dong code (natural key).
    pub adm_dong_code: i64,
    /// District name as first observed by the sales stage.
    pub adm_dong_name: String,
    /// Sales figures keyed by fine-grained sales category code.
    pub sales: BTreeMap<String, SalesFigures>,
    /// Business counts keyed by coarse-grained business category code.
    pub business_counts: BTreeMap<String, i64>,
    /// Floating (transient) population.
    pub floating_population: Option<i64>,
    /// Residential population.
    pub residential_population: Option<i64>,
    /// Working population.
    pub working_population: Option<i64>,
    /// Number of households.
    pub household_count: Option<i64>,
    /// Income in currency units.
    pub income: Option<i64>,
    /// Consumption in currency units.
    pub consumption: Option<i64>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl AdminDongRecord {
    /// Creates an empty record for a district, stamped with the current
    /// time.
    #[must_use]
    pub fn new(adm_dong_code: i64, adm_dong_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            adm_dong_code,
            adm_dong_name: adm_dong_name.into(),
            sales: BTreeMap::new(),
            business_counts: BTreeMap::new(),
            floating_population: None,
            residential_population: None,
            working_population: None,
            household_count: None,
            income: None,
            consumption: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the sales figures for one category.
    pub fn set_sales(&mut self, category_code: impl Into<String>, figures: SalesFigures) {
        self.sales.insert(category_code.into(), figures);
        self.touch();
    }

    /// Overwrites the business count for one category.
    pub fn set_business_count(&mut self, category_code: impl Into<String>, count: i64) {
        self.business_counts.insert(category_code.into(), count);
        self.touch();
    }

    /// Sets income and/or consumption, leaving `None` arguments untouched.
    pub fn set_income_consumption(&mut self, income: Option<i64>, consumption: Option<i64>) {
        if let Some(income) = income {
            self.income = Some(income);
        }
        if let Some(consumption) = consumption {
            self.consumption = Some(consumption);
        }
        self.touch();
    }

    /// Bumps `updated_at` to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
