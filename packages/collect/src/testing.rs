//! Scripted collaborators shared by the stage and orchestrator tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use district_stats_analysis_models::AdminDongRecord;
use district_stats_collect_models::CollectOptions;
use district_stats_database::memory::MemoryStore;
use district_stats_database::{AnalysisStore, DbError};
use district_stats_geography::GeoRegistry;
use district_stats_geography_models::{AreaCode, CityGrid, FoodCategory, GeoBox};
use district_stats_source::{SourceError, StatsSource};
use district_stats_source_models::{
    AmountRow, ApiFamily, FloatingPopulationRow, ResidentRow, SalesRow, WorkerRow,
};

/// Registry with one city (`seoul`) of `boxes` boxes, `categories`
/// categories with multipliers 1.0, 1.25, 1.5, ... and two area codes.
pub fn stub_registry(boxes: usize, categories: usize) -> GeoRegistry {
    let grid = CityGrid {
        id: "seoul".to_string(),
        name: "Seoul".to_string(),
        aliases: vec!["서울".to_string()],
        boxes: (0..boxes)
            .map(|i| {
                let offset = i64::try_from(i).unwrap() * 1_000;
                GeoBox::new(offset, offset + 1_000, 0, 1_000)
            })
            .collect(),
    };
    let categories = (0..categories)
        .map(|i| FoodCategory {
            id: format!("cat{i}"),
            name: format!("Category {i}"),
            sales_code: format!("S{i}"),
            business_code: format!("B{i}"),
            multiplier: 0.25f64.mul_add(f64::from(u32::try_from(i).unwrap()), 1.0),
        })
        .collect();
    let area_codes = vec![
        AreaCode {
            code: "11110".to_string(),
            name: "Jongno-gu".to_string(),
        },
        AreaCode {
            code: "11140".to_string(),
            name: "Jung-gu".to_string(),
        },
    ];
    GeoRegistry::new(vec![grid], categories, area_codes)
}

/// No retries, no pacing.
pub const fn fast_options() -> CollectOptions {
    CollectOptions {
        retry_count: 0,
        delay_ms: 0,
    }
}

pub fn sales_row(code: &str, name: &str, stores: &str, amount: &str) -> SalesRow {
    SalesRow {
        store_cnt: stores.to_string(),
        sale_amt: amount.to_string(),
        adm_cd: code.to_string(),
        adm_nm: name.to_string(),
    }
}

pub fn amount_row(code: &str, name: &str, amount: &str) -> AmountRow {
    AmountRow {
        amount: amount.to_string(),
        adm_cd: code.to_string(),
        adm_nm: name.to_string(),
    }
}

pub fn floating_row(code: &str, name: &str, stores: &str, floating: &str) -> FloatingPopulationRow {
    FloatingPopulationRow {
        area_nm: name.to_string(),
        area_gb: "1".to_string(),
        area_cd: code.to_string(),
        upso_cnt: stores.to_string(),
        dyn_popnum: floating.to_string(),
    }
}

pub fn resident_row(code: &str, name: &str, households: &str, population: &str) -> ResidentRow {
    ResidentRow {
        area_nm: name.to_string(),
        area_cd: code.to_string(),
        hous: households.to_string(),
        pop: population.to_string(),
    }
}

pub fn worker_row(code: &str, name: &str, workers: &str) -> WorkerRow {
    WorkerRow {
        area_nm: name.to_string(),
        area_cd: code.to_string(),
        wrc_popnum: workers.to_string(),
    }
}

/// A [`StatsSource`] answering from fixed tables.
///
/// Every call of a family returns the same rows (sales and floating
/// population are keyed by category code). The first `n` attempts of a
/// family can be made to fail with HTTP 503.
#[derive(Default)]
pub struct ScriptedSource {
    sales: BTreeMap<String, Vec<SalesRow>>,
    consumption: Vec<AmountRow>,
    income: Vec<AmountRow>,
    floating: BTreeMap<String, Vec<FloatingPopulationRow>>,
    residents: Vec<ResidentRow>,
    workers: Vec<WorkerRow>,
    failures: BTreeMap<ApiFamily, u32>,
    attempts: Mutex<BTreeMap<ApiFamily, u32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sales(mut self, category_code: &str, rows: Vec<SalesRow>) -> Self {
        self.sales.insert(category_code.to_string(), rows);
        self
    }

    pub fn with_consumption(mut self, rows: Vec<AmountRow>) -> Self {
        self.consumption = rows;
        self
    }

    pub fn with_income(mut self, rows: Vec<AmountRow>) -> Self {
        self.income = rows;
        self
    }

    pub fn with_floating(mut self, category_code: &str, rows: Vec<FloatingPopulationRow>) -> Self {
        self.floating.insert(category_code.to_string(), rows);
        self
    }

    pub fn with_residents(mut self, rows: Vec<ResidentRow>) -> Self {
        self.residents = rows;
        self
    }

    pub fn with_workers(mut self, rows: Vec<WorkerRow>) -> Self {
        self.workers = rows;
        self
    }

    /// Makes the first `times` attempts of `family` fail.
    pub fn fail_times(mut self, family: ApiFamily, times: u32) -> Self {
        self.failures.insert(family, times);
        self
    }

    /// Attempts made against `family`, retries included.
    pub fn attempts(&self, family: ApiFamily) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&family)
            .copied()
            .unwrap_or(0)
    }

    /// Every attempt, in order, as `"<family> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn attempt(&self, family: ApiFamily, target: String) -> Result<(), SourceError> {
        self.calls.lock().unwrap().push(format!("{family} {target}"));
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(family).or_insert(0);
        *count += 1;
        if *count <= self.failures.get(&family).copied().unwrap_or(0) {
            return Err(SourceError::Status {
                family,
                status: 503,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatsSource for ScriptedSource {
    async fn sales(
        &self,
        geo_box: &GeoBox,
        category_code: &str,
    ) -> Result<Vec<SalesRow>, SourceError> {
        self.attempt(ApiFamily::Sales, format!("{geo_box} {category_code}"))?;
        Ok(self.sales.get(category_code).cloned().unwrap_or_default())
    }

    async fn consumption(&self, geo_box: &GeoBox) -> Result<Vec<AmountRow>, SourceError> {
        self.attempt(ApiFamily::Consumption, geo_box.to_string())?;
        Ok(self.consumption.clone())
    }

    async fn income(&self, geo_box: &GeoBox) -> Result<Vec<AmountRow>, SourceError> {
        self.attempt(ApiFamily::Income, geo_box.to_string())?;
        Ok(self.income.clone())
    }

    async fn floating_population(
        &self,
        area_code: &str,
        category_code: &str,
    ) -> Result<Vec<FloatingPopulationRow>, SourceError> {
        self.attempt(
            ApiFamily::FloatingPopulation,
            format!("{area_code} {category_code}"),
        )?;
        Ok(self.floating.get(category_code).cloned().unwrap_or_default())
    }

    async fn residents(&self, area_code: &str) -> Result<Vec<ResidentRow>, SourceError> {
        self.attempt(ApiFamily::Residents, area_code.to_string())?;
        Ok(self.residents.clone())
    }

    async fn workers(&self, area_code: &str) -> Result<Vec<WorkerRow>, SourceError> {
        self.attempt(ApiFamily::Workers, area_code.to_string())?;
        Ok(self.workers.clone())
    }
}

/// An [`AnalysisStore`] over a [`MemoryStore`] that can refuse lookups or
/// saves for chosen codes, or lose a record after a number of lookups.
///
/// Lookups are counted per code, starting at 1.
pub struct FlakyStore {
    inner: Mutex<MemoryStore>,
    lookups: Mutex<BTreeMap<i64, u32>>,
    failing_lookups: BTreeMap<i64, u32>,
    vanishing: BTreeMap<i64, u32>,
    failing_upserts: BTreeSet<i64>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner: Mutex::new(inner),
            lookups: Mutex::new(BTreeMap::new()),
            failing_lookups: BTreeMap::new(),
            vanishing: BTreeMap::new(),
            failing_upserts: BTreeSet::new(),
        }
    }

    /// Makes lookup number `nth` of `code`, and every later one, fail.
    pub fn fail_lookups_from(mut self, code: i64, nth: u32) -> Self {
        self.failing_lookups.insert(code, nth);
        self
    }

    /// Removes the record for `code` once it has been looked up `lookups`
    /// times.
    pub fn vanish_after(mut self, code: i64, lookups: u32) -> Self {
        self.vanishing.insert(code, lookups);
        self
    }

    /// Makes every save of `code` fail.
    pub fn fail_upserts(mut self, code: i64) -> Self {
        self.failing_upserts.insert(code);
        self
    }

    pub fn get(&self, code: i64) -> Option<AdminDongRecord> {
        self.inner.lock().unwrap().get(code).cloned()
    }

    /// Lookups made for `code` so far.
    pub fn lookups(&self, code: i64) -> u32 {
        self.lookups.lock().unwrap().get(&code).copied().unwrap_or(0)
    }
}

impl AnalysisStore for FlakyStore {
    fn find_by_key(&self, adm_dong_code: i64) -> Result<Option<AdminDongRecord>, DbError> {
        let nth = {
            let mut lookups = self.lookups.lock().unwrap();
            let count = lookups.entry(adm_dong_code).or_insert(0);
            *count += 1;
            *count
        };
        if self
            .failing_lookups
            .get(&adm_dong_code)
            .is_some_and(|&from| nth >= from)
        {
            return Err(DbError::Conversion {
                message: "connection reset".to_string(),
            });
        }

        let mut inner = self.inner.lock().unwrap();
        if self
            .vanishing
            .get(&adm_dong_code)
            .is_some_and(|&after| nth > after)
        {
            inner.remove(adm_dong_code);
        }
        inner.find_by_key(adm_dong_code)
    }

    fn upsert(&mut self, record: &AdminDongRecord) -> Result<(), DbError> {
        if self.failing_upserts.contains(&record.adm_dong_code) {
            return Err(DbError::Conversion {
                message: "disk full".to_string(),
            });
        }
        self.inner.get_mut().unwrap().upsert(record)
    }

    fn count(&self) -> Result<u64, DbError> {
        self.inner.lock().unwrap().count()
    }
}
