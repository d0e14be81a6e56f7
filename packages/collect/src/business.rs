//! Business/population stage: area code × business category, plus the
//! residents and workers endpoints per area code.
//!
//! Update-only with screening: sub-district rows (codes under eight
//! digits) are skipped, and each district's record is looked up before
//! anything is accumulated for it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use district_stats_analysis_models::{AdminDongRecord, is_district_level, parse_admin_code};
use district_stats_collect_models::{
    BusinessPopulationRequest, CollectionProgress, CollectionStage,
};
use district_stats_geography::GeoRegistry;
use district_stats_source::parsing::{is_valid_district, parse_number};
use district_stats_source::{SourceError, StatsSource};
use district_stats_source_models::{FloatingPopulationRow, ResidentRow, WorkerRow};

use crate::StageError;
use crate::engine::{ParsedRow, PersistPolicy, Stage};

/// One area-level call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaCall {
    /// Business count for one category, with floating population.
    Business {
        area_code: String,
        category_code: String,
    },
    /// Households and residential population.
    Residents { area_code: String },
    /// Working population.
    Workers { area_code: String },
}

/// A row from any of the area endpoints.
#[derive(Debug, Clone)]
pub enum AreaRow {
    Floating(FloatingPopulationRow),
    Resident(ResidentRow),
    Worker(WorkerRow),
}

/// What one area row contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaValue {
    Business {
        category_code: String,
        count: Option<i64>,
        floating_population: Option<i64>,
    },
    Residents {
        households: Option<i64>,
        population: Option<i64>,
    },
    Workers(i64),
}

/// Business counts and population accumulated for one district.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaContribution {
    pub business_counts: BTreeMap<String, i64>,
    pub floating_population: Option<i64>,
    pub household_count: Option<i64>,
    pub residential_population: Option<i64>,
    pub working_population: Option<i64>,
}

/// Business/population stage definition.
#[derive(Debug, Clone)]
pub struct BusinessPopulationStage {
    area_codes: Vec<String>,
    include_business_count: bool,
    include_population_data: bool,
}

impl BusinessPopulationStage {
    #[must_use]
    pub fn new(request: &BusinessPopulationRequest) -> Self {
        Self {
            area_codes: request.area_codes.clone(),
            include_business_count: request.include_business_count,
            include_population_data: request.include_population_data,
        }
    }
}

fn district(code: &str, name: &str) -> Option<i64> {
    if !is_valid_district(code, name) {
        return None;
    }
    let parsed = parse_admin_code(code)?;
    if is_district_level(parsed) {
        Some(parsed)
    } else {
        log::debug!("business/population: skipping sub-district area {code} ({name})");
        None
    }
}

#[async_trait]
impl Stage for BusinessPopulationStage {
    type Call = AreaCall;
    type Row = AreaRow;
    type Value = AreaValue;
    type Contribution = AreaContribution;

    const STAGE: CollectionStage = CollectionStage::BusinessPopulation;
    const POLICY: PersistPolicy = PersistPolicy::UpdateOnlyScreened;

    fn plan(
        &self,
        registry: &GeoRegistry,
        _progress: &mut CollectionProgress,
    ) -> Result<Vec<AreaCall>, StageError> {
        if !self.include_business_count && !self.include_population_data {
            return Err(StageError::NothingRequested);
        }
        if self.area_codes.is_empty() {
            return Err(StageError::NoAreaCodes);
        }
        let categories = if self.include_business_count {
            let codes = registry.business_category_codes();
            if codes.is_empty() {
                return Err(StageError::NoCategories);
            }
            codes
        } else {
            Vec::new()
        };

        let mut calls = Vec::new();
        for area_code in &self.area_codes {
            calls.extend(categories.iter().map(|category_code| AreaCall::Business {
                area_code: area_code.clone(),
                category_code: category_code.clone(),
            }));
            if self.include_population_data {
                calls.push(AreaCall::Residents {
                    area_code: area_code.clone(),
                });
                calls.push(AreaCall::Workers {
                    area_code: area_code.clone(),
                });
            }
        }
        Ok(calls)
    }

    fn describe(&self, call: &AreaCall) -> String {
        match call {
            AreaCall::Business {
                area_code,
                category_code,
            } => format!("business {area_code} {category_code}"),
            AreaCall::Residents { area_code } => format!("residents {area_code}"),
            AreaCall::Workers { area_code } => format!("workers {area_code}"),
        }
    }

    async fn fetch(
        &self,
        source: &dyn StatsSource,
        call: &AreaCall,
    ) -> Result<Vec<AreaRow>, SourceError> {
        Ok(match call {
            AreaCall::Business {
                area_code,
                category_code,
            } => source
                .floating_population(area_code, category_code)
                .await?
                .into_iter()
                .map(AreaRow::Floating)
                .collect(),
            AreaCall::Residents { area_code } => source
                .residents(area_code)
                .await?
                .into_iter()
                .map(AreaRow::Resident)
                .collect(),
            AreaCall::Workers { area_code } => source
                .workers(area_code)
                .await?
                .into_iter()
                .map(AreaRow::Worker)
                .collect(),
        })
    }

    fn parse(
        &self,
        call: &AreaCall,
        row: &AreaRow,
    ) -> Result<Option<ParsedRow<AreaValue>>, SourceError> {
        let (code, name, value) = match row {
            AreaRow::Floating(row) => {
                let AreaCall::Business { category_code, .. } = call else {
                    return Ok(None);
                };
                let Some(code) = district(&row.area_cd, &row.area_nm) else {
                    return Ok(None);
                };
                let count = parse_number("upsoCnt", &row.upso_cnt)?;
                let floating_population = parse_number("dynPopnum", &row.dyn_popnum)?;
                if count.is_none() && floating_population.is_none() {
                    return Ok(None);
                }
                (
                    code,
                    &row.area_nm,
                    AreaValue::Business {
                        category_code: category_code.clone(),
                        count,
                        floating_population,
                    },
                )
            }
            AreaRow::Resident(row) => {
                let Some(code) = district(&row.area_cd, &row.area_nm) else {
                    return Ok(None);
                };
                let households = parse_number("hous", &row.hous)?;
                let population = parse_number("pop", &row.pop)?;
                if households.is_none() && population.is_none() {
                    return Ok(None);
                }
                (
                    code,
                    &row.area_nm,
                    AreaValue::Residents {
                        households,
                        population,
                    },
                )
            }
            AreaRow::Worker(row) => {
                let Some(code) = district(&row.area_cd, &row.area_nm) else {
                    return Ok(None);
                };
                let Some(workers) = parse_number("wrcPopnum", &row.wrc_popnum)? else {
                    return Ok(None);
                };
                (code, &row.area_nm, AreaValue::Workers(workers))
            }
        };

        Ok(Some(ParsedRow {
            code,
            name: name.trim().to_string(),
            value,
        }))
    }

    fn merge(&self, contribution: &mut AreaContribution, value: AreaValue) {
        match value {
            AreaValue::Business {
                category_code,
                count,
                floating_population,
            } => {
                if let Some(count) = count {
                    contribution.business_counts.insert(category_code, count);
                }
                if contribution.floating_population.is_none() {
                    contribution.floating_population = floating_population;
                }
            }
            AreaValue::Residents {
                households,
                population,
            } => {
                if households.is_some() {
                    contribution.household_count = households;
                }
                if population.is_some() {
                    contribution.residential_population = population;
                }
            }
            AreaValue::Workers(workers) => contribution.working_population = Some(workers),
        }
    }

    fn apply(&self, record: &mut AdminDongRecord, contribution: &AreaContribution) {
        for (category_code, count) in &contribution.business_counts {
            record.set_business_count(category_code.clone(), *count);
        }
        if let Some(value) = contribution.floating_population {
            record.floating_population = Some(value);
        }
        if let Some(value) = contribution.household_count {
            record.household_count = Some(value);
        }
        if let Some(value) = contribution.residential_population {
            record.residential_population = Some(value);
        }
        if let Some(value) = contribution.working_population {
            record.working_population = Some(value);
        }
        record.touch();
    }
}

#[cfg(test)]
mod tests {
    use district_stats_collect_models::CollectionStatus;
    use district_stats_database::AnalysisStore;
    use district_stats_database::memory::MemoryStore;
    use district_stats_source::progress::NullProgress;
    use district_stats_source_models::ApiFamily;

    use super::*;
    use crate::engine::run_stage;
    use crate::testing::{
        FlakyStore, ScriptedSource, fast_options, floating_row, resident_row, stub_registry,
        worker_row,
    };

    fn request(business: bool, population: bool) -> BusinessPopulationRequest {
        BusinessPopulationRequest {
            area_codes: vec!["11110".to_string(), "11140".to_string()],
            include_business_count: business,
            include_population_data: population,
            options: fast_options(),
        }
    }

    async fn run(
        registry: &GeoRegistry,
        source: &ScriptedSource,
        store: &mut dyn AnalysisStore,
        request: &BusinessPopulationRequest,
    ) -> CollectionProgress {
        run_stage(
            &BusinessPopulationStage::new(request),
            registry,
            source,
            store,
            request.options,
            &NullProgress,
        )
        .await
    }

    fn seeded_store() -> MemoryStore {
        MemoryStore::with_records([AdminDongRecord::new(11_110_515, "Cheongun-dong")])
    }

    #[tokio::test]
    async fn call_count_follows_flags() {
        let registry = stub_registry(1, 3);
        let mut store = MemoryStore::new();

        let source = ScriptedSource::new();

        let both = run(&registry, &source, &mut store, &request(true, true)).await;
        assert_eq!(both.total_api_calls, 2 * 3 + 2 * 2);

        let business = run(&registry, &source, &mut store, &request(true, false)).await;
        assert_eq!(business.total_api_calls, 6);

        let population = run(&registry, &source, &mut store, &request(false, true)).await;
        assert_eq!(population.total_api_calls, 4);
    }

    #[tokio::test]
    async fn both_flags_off_fails() {
        let registry = stub_registry(1, 3);
        let source = ScriptedSource::new();
        let mut store = MemoryStore::new();

        let progress = run(&registry, &source, &mut store, &request(false, false)).await;

        assert_eq!(progress.status, CollectionStatus::Failed);
        assert_eq!(source.calls().len(), 0);
    }

    #[tokio::test]
    async fn sub_district_codes_are_discarded() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_floating("B0", vec![floating_row("11010", "Jongno-gu", "50", "900")]);
        let mut store = MemoryStore::with_records([AdminDongRecord::new(11_010, "Jongno-gu")]);

        let progress = run(&registry, &source, &mut store, &request(true, false)).await;

        let record = store.get(11_010).unwrap();
        assert!(record.business_counts.is_empty());
        assert_eq!(record.floating_population, None);
        assert_eq!(progress.total_records, 0);
        assert_eq!(progress.failure_records, 0);
        assert_eq!(progress.status, CollectionStatus::Completed);
    }

    #[tokio::test]
    async fn missing_record_is_skipped_not_created() {
        let registry = stub_registry(1, 2);
        let source = ScriptedSource::new()
            .with_floating("B0", vec![floating_row("11110999", "Nowhere-dong", "5", "10")])
            .with_floating("B1", vec![floating_row("11110999", "Nowhere-dong", "6", "10")]);
        let mut store = seeded_store();

        let progress = run(&registry, &source, &mut store, &request(true, false)).await;

        assert!(store.find_by_key(11_110_999).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(progress.failure_records, 1);
        assert_eq!(progress.total_records, 1);
        assert_eq!(progress.warnings.len(), 1);
    }

    #[tokio::test]
    async fn accumulates_counts_and_population() {
        let registry = stub_registry(1, 2);
        let source = ScriptedSource::new()
            .with_floating("B0", vec![floating_row("11110515", "Cheongun-dong", "50", "1,200")])
            .with_floating("B1", vec![floating_row("11110515", "Cheongun-dong", "7", "9,999")])
            .with_residents(vec![resident_row("11110515", "Cheongun-dong", "1,500", "3,200")])
            .with_workers(vec![worker_row("11110515", "Cheongun-dong", "870")]);
        let mut store = seeded_store();

        let progress = run(&registry, &source, &mut store, &request(true, true)).await;

        let record = store.get(11_110_515).unwrap();
        assert_eq!(record.business_counts["B0"], 50);
        assert_eq!(record.business_counts["B1"], 7);
        assert_eq!(record.floating_population, Some(1_200));
        assert_eq!(record.household_count, Some(1_500));
        assert_eq!(record.residential_population, Some(3_200));
        assert_eq!(record.working_population, Some(870));
        assert!(record.sales.is_empty());
        assert_eq!(progress.total_records, 1);
        assert_eq!(progress.success_records, 1);
        assert_eq!(progress.status, CollectionStatus::Completed);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_floating("B0", vec![floating_row("11110515", "Cheongun-dong", "50", "1,200")]);
        let mut store = seeded_store();

        run(&registry, &source, &mut store, &request(true, false)).await;
        let first = store.get(11_110_515).unwrap().clone();
        run(&registry, &source, &mut store, &request(true, false)).await;
        let second = store.get(11_110_515).unwrap();

        assert_eq!(first.business_counts, second.business_counts);
        assert_eq!(first.floating_population, second.floating_population);
    }

    #[tokio::test]
    async fn failed_area_call_does_not_stop_the_stage() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .fail_times(ApiFamily::Residents, 1)
            .with_workers(vec![worker_row("11110515", "Cheongun-dong", "10")]);
        let mut store = seeded_store();

        let progress = run(&registry, &source, &mut store, &request(false, true)).await;

        assert_eq!(progress.failure_api_calls, 1);
        assert_eq!(progress.success_api_calls, 3);
        assert_eq!(progress.status, CollectionStatus::PartialSuccess);
        assert_eq!(store.get(11_110_515).unwrap().working_population, Some(10));
    }

    #[test]
    fn floating_population_keeps_first_value() {
        let stage = BusinessPopulationStage::new(&request(true, false));
        let mut contribution = AreaContribution::default();
        for (category, floating) in [("B0", Some(5)), ("B1", Some(9))] {
            stage.merge(
                &mut contribution,
                AreaValue::Business {
                    category_code: category.to_string(),
                    count: Some(1),
                    floating_population: floating,
                },
            );
        }
        assert_eq!(contribution.floating_population, Some(5));
        assert_eq!(contribution.business_counts.len(), 2);
    }

    #[tokio::test]
    async fn record_vanishing_after_screening_is_a_failed_record() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_residents(vec![resident_row("11110515", "Cheongun-dong", "1,500", "3,200")])
            .with_workers(vec![worker_row("11110515", "Cheongun-dong", "870")]);
        let mut store = FlakyStore::new(seeded_store()).vanish_after(11_110_515, 1);

        let progress = run(&registry, &source, &mut store, &request(false, true)).await;

        assert_eq!(store.lookups(11_110_515), 2);
        assert_eq!(progress.status, CollectionStatus::PartialSuccess);
        assert_eq!(progress.total_records, 1);
        assert_eq!(progress.failure_records, 1);
        assert_eq!(
            progress.warnings,
            vec!["BUSINESS_POPULATION: analysis record 11110515 disappeared before persist"]
        );
        assert!(store.get(11_110_515).is_none());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn screening_lookup_failure_drops_the_district() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_residents(vec![resident_row("11110515", "Cheongun-dong", "1,500", "3,200")])
            .with_workers(vec![worker_row("11110515", "Cheongun-dong", "870")]);
        let mut store = FlakyStore::new(seeded_store()).fail_lookups_from(11_110_515, 1);

        let progress = run(&registry, &source, &mut store, &request(false, true)).await;

        assert_eq!(store.lookups(11_110_515), 1);
        assert_eq!(progress.status, CollectionStatus::PartialSuccess);
        assert_eq!(progress.success_api_calls, 4);
        assert_eq!(progress.total_records, 1);
        assert_eq!(progress.failure_records, 1);
        assert_eq!(progress.error_messages.len(), 1);
        assert!(
            progress.error_messages[0]
                .starts_with("BUSINESS_POPULATION: lookup of 11110515 failed:")
        );
        let record = store.get(11_110_515).unwrap();
        assert_eq!(record.residential_population, None);
        assert_eq!(record.working_population, None);
    }
}
