//! Request types for the collection entry points.

use serde::{Deserialize, Serialize};

use crate::CollectionStage;

/// Retries per logical API call used by `collect_all`.
pub const DEFAULT_RETRY_COUNT: u32 = 2;

/// Delay after each logical API call used by `collect_all`.
pub const DEFAULT_DELAY_MS: u64 = 200;

/// Retry and pacing options shared by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOptions {
    /// Extra attempts after the first failed one.
    pub retry_count: u32,
    /// Milliseconds to wait after every logical API call.
    pub delay_ms: u64,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

/// Input to the sales stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRequest {
    /// City ids or aliases. Must not be empty.
    pub cities: Vec<String>,
    /// Scale amounts by each category's multiplier.
    pub apply_multiplier: bool,
    /// Retry and pacing.
    pub options: CollectOptions,
}

/// Input to the income/consumption stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeConsumptionRequest {
    /// City ids or aliases. Must not be empty.
    pub cities: Vec<String>,
    /// Retry and pacing.
    pub options: CollectOptions,
}

/// Input to the business/population stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPopulationRequest {
    /// Area codes to query. Must not be empty.
    pub area_codes: Vec<String>,
    /// Fetch per-category business counts and floating population.
    pub include_business_count: bool,
    /// Fetch resident and worker population.
    pub include_population_data: bool,
    /// Retry and pacing.
    pub options: CollectOptions,
}

/// Input to the integrated pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    /// City ids or aliases for the box-based stages.
    pub cities: Vec<String>,
    /// Area codes for the business/population stage.
    pub area_codes: Vec<String>,
    /// Run the sales stage.
    pub include_sales: bool,
    /// Run the income/consumption stage.
    pub include_income_consumption: bool,
    /// Fetch business counts in the business/population stage.
    pub include_business_count: bool,
    /// Fetch resident/worker population in the business/population stage.
    pub include_population_data: bool,
    /// Scale sales amounts by category multipliers.
    pub apply_multiplier: bool,
    /// Extra attempts after a failed call.
    pub retry_count: u32,
    /// Milliseconds to wait after every logical API call.
    pub delay_ms: u64,
}

impl Default for CollectionRequest {
    fn default() -> Self {
        Self {
            cities: Vec::new(),
            area_codes: Vec::new(),
            include_sales: true,
            include_income_consumption: true,
            include_business_count: true,
            include_population_data: true,
            apply_multiplier: true,
            retry_count: DEFAULT_RETRY_COUNT,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl CollectionRequest {
    /// Shared retry and pacing options.
    #[must_use]
    pub const fn options(&self) -> CollectOptions {
        CollectOptions {
            retry_count: self.retry_count,
            delay_ms: self.delay_ms,
        }
    }

    /// Stages this request enables, in pipeline order.
    #[must_use]
    pub fn enabled_stages(&self) -> Vec<CollectionStage> {
        let mut stages = Vec::with_capacity(3);
        if self.include_sales {
            stages.push(CollectionStage::Sales);
        }
        if self.include_income_consumption {
            stages.push(CollectionStage::IncomeConsumption);
        }
        if self.include_business_count || self.include_population_data {
            stages.push(CollectionStage::BusinessPopulation);
        }
        stages
    }

    /// The sales-stage slice of this request.
    #[must_use]
    pub fn sales(&self) -> SalesRequest {
        SalesRequest {
            cities: self.cities.clone(),
            apply_multiplier: self.apply_multiplier,
            options: self.options(),
        }
    }

    /// The income/consumption-stage slice of this request.
    #[must_use]
    pub fn income_consumption(&self) -> IncomeConsumptionRequest {
        IncomeConsumptionRequest {
            cities: self.cities.clone(),
            options: self.options(),
        }
    }

    /// The business/population-stage slice of this request.
    #[must_use]
    pub fn business_population(&self) -> BusinessPopulationRequest {
        BusinessPopulationRequest {
            area_codes: self.area_codes.clone(),
            include_business_count: self.include_business_count,
            include_population_data: self.include_population_data,
            options: self.options(),
        }
    }
}
