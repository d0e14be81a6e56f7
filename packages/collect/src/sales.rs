//! Sales stage: city × box × sales category.
//!
//! The only stage allowed to create analysis records. Each row yields the
//! store count and sales amount of one category in one district; the
//! amount is converted from units of 10,000 and optionally scaled by the
//! category multiplier.

use std::collections::BTreeMap;

use async_trait::async_trait;
use district_stats_analysis_models::{AdminDongRecord, SalesFigures, parse_admin_code};
use district_stats_collect_models::{CollectionProgress, CollectionStage, SalesRequest};
use district_stats_geography::GeoRegistry;
use district_stats_source::parsing::{is_valid_district, parse_currency, parse_number};
use district_stats_source::{SourceError, StatsSource};
use district_stats_source_models::SalesRow;

use crate::StageError;
use crate::engine::{CityBox, ParsedRow, PersistPolicy, Stage, city_boxes};

/// One sales call.
#[derive(Debug, Clone)]
pub struct SalesCall {
    /// Box being queried.
    pub target: CityBox,
    /// Fine-grained category code.
    pub category_code: String,
    /// Factor applied to amounts (1.0 when multipliers are off).
    pub multiplier: f64,
}

/// Sales stage definition.
#[derive(Debug, Clone)]
pub struct SalesStage {
    cities: Vec<String>,
    apply_multiplier: bool,
}

impl SalesStage {
    #[must_use]
    pub fn new(request: &SalesRequest) -> Self {
        Self {
            cities: request.cities.clone(),
            apply_multiplier: request.apply_multiplier,
        }
    }
}

/// Scales a currency amount by a multiplier, rounding to the nearest unit.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn scale_amount(amount: i64, multiplier: f64) -> i64 {
    if (multiplier - 1.0).abs() < f64::EPSILON {
        return amount;
    }
    (amount as f64 * multiplier).round() as i64
}

#[async_trait]
impl Stage for SalesStage {
    type Call = SalesCall;
    type Row = SalesRow;
    type Value = (String, SalesFigures);
    type Contribution = BTreeMap<String, SalesFigures>;

    const STAGE: CollectionStage = CollectionStage::Sales;
    const POLICY: PersistPolicy = PersistPolicy::CreateOrUpdate;

    fn plan(
        &self,
        registry: &GeoRegistry,
        progress: &mut CollectionProgress,
    ) -> Result<Vec<SalesCall>, StageError> {
        let boxes = city_boxes(registry, &self.cities, progress)?;
        let codes = registry.sales_category_codes();
        if codes.is_empty() {
            return Err(StageError::NoCategories);
        }

        let mut calls = Vec::with_capacity(boxes.len() * codes.len());
        for target in boxes {
            for code in &codes {
                let multiplier = if self.apply_multiplier {
                    registry.multiplier_for(code)
                } else {
                    1.0
                };
                calls.push(SalesCall {
                    target: target.clone(),
                    category_code: code.clone(),
                    multiplier,
                });
            }
        }
        Ok(calls)
    }

    fn describe(&self, call: &SalesCall) -> String {
        format!("sales {} {}", call.target, call.category_code)
    }

    async fn fetch(
        &self,
        source: &dyn StatsSource,
        call: &SalesCall,
    ) -> Result<Vec<SalesRow>, SourceError> {
        source.sales(&call.target.geo_box, &call.category_code).await
    }

    fn parse(
        &self,
        call: &SalesCall,
        row: &SalesRow,
    ) -> Result<Option<ParsedRow<Self::Value>>, SourceError> {
        if !is_valid_district(&row.adm_cd, &row.adm_nm) {
            return Ok(None);
        }
        let Some(code) = parse_admin_code(&row.adm_cd) else {
            log::debug!("sales: non-numeric admin code {:?}", row.adm_cd);
            return Ok(None);
        };

        let store_count = parse_number("storeCnt", &row.store_cnt)?.unwrap_or(0);
        let amount = parse_currency("saleAmt", &row.sale_amt)?.unwrap_or(0);

        Ok(Some(ParsedRow {
            code,
            name: row.adm_nm.trim().to_string(),
            value: (
                call.category_code.clone(),
                SalesFigures {
                    store_count,
                    sales_amount: scale_amount(amount, call.multiplier),
                },
            ),
        }))
    }

    fn merge(&self, contribution: &mut Self::Contribution, value: Self::Value) {
        let (category_code, figures) = value;
        contribution.insert(category_code, figures);
    }

    fn apply(&self, record: &mut AdminDongRecord, contribution: &Self::Contribution) {
        for (category_code, figures) in contribution {
            record.set_sales(category_code.clone(), *figures);
        }
    }
}
