//! Income/consumption stage: city × box × {consumption, income}.
//!
//! Update-only. Districts without a sales-created record are dropped at
//! persist time and counted as failed records.

use async_trait::async_trait;
use district_stats_analysis_models::{AdminDongRecord, parse_admin_code};
use district_stats_collect_models::{
    CollectionProgress, CollectionStage, IncomeConsumptionRequest,
};
use district_stats_geography::GeoRegistry;
use district_stats_source::parsing::{is_valid_district, parse_currency};
use district_stats_source::{SourceError, StatsSource};
use district_stats_source_models::AmountRow;

use crate::StageError;
use crate::engine::{CityBox, ParsedRow, PersistPolicy, Stage, city_boxes};

/// Which amount a call fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountKind {
    Consumption,
    Income,
}

impl AmountKind {
    const fn wire_field(self) -> &'static str {
        match self {
            Self::Consumption => "wholCnsmpAmt",
            Self::Income => "wholEarnAmt",
        }
    }
}

/// One income or consumption call.
#[derive(Debug, Clone)]
pub struct AmountCall {
    pub target: CityBox,
    pub kind: AmountKind,
}

/// Income and consumption accumulated for one district.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncomeConsumption {
    pub income: Option<i64>,
    pub consumption: Option<i64>,
}

/// Income/consumption stage definition.
#[derive(Debug, Clone)]
pub struct IncomeConsumptionStage {
    cities: Vec<String>,
}

impl IncomeConsumptionStage {
    #[must_use]
    pub fn new(request: &IncomeConsumptionRequest) -> Self {
        Self {
            cities: request.cities.clone(),
        }
    }
}

#[async_trait]
impl Stage for IncomeConsumptionStage {
    type Call = AmountCall;
    type Row = AmountRow;
    type Value = (AmountKind, i64);
    type Contribution = IncomeConsumption;

    const STAGE: CollectionStage = CollectionStage::IncomeConsumption;
    const POLICY: PersistPolicy = PersistPolicy::UpdateOnly;

    fn plan(
        &self,
        registry: &GeoRegistry,
        progress: &mut CollectionProgress,
    ) -> Result<Vec<AmountCall>, StageError> {
        Ok(city_boxes(registry, &self.cities, progress)?
            .into_iter()
            .flat_map(|target| {
                [AmountKind::Consumption, AmountKind::Income].map(|kind| AmountCall {
                    target: target.clone(),
                    kind,
                })
            })
            .collect())
    }

    fn describe(&self, call: &AmountCall) -> String {
        match call.kind {
            AmountKind::Consumption => format!("consumption {}", call.target),
            AmountKind::Income => format!("income {}", call.target),
        }
    }

    async fn fetch(
        &self,
        source: &dyn StatsSource,
        call: &AmountCall,
    ) -> Result<Vec<AmountRow>, SourceError> {
        match call.kind {
            AmountKind::Consumption => source.consumption(&call.target.geo_box).await,
            AmountKind::Income => source.income(&call.target.geo_box).await,
        }
    }

    fn parse(
        &self,
        call: &AmountCall,
        row: &AmountRow,
    ) -> Result<Option<ParsedRow<Self::Value>>, SourceError> {
        if !is_valid_district(&row.adm_cd, &row.adm_nm) {
            return Ok(None);
        }
        let Some(code) = parse_admin_code(&row.adm_cd) else {
            return Ok(None);
        };
        let Some(amount) = parse_currency(call.kind.wire_field(), &row.amount)? else {
            return Ok(None);
        };

        Ok(Some(ParsedRow {
            code,
            name: row.adm_nm.trim().to_string(),
            value: (call.kind, amount),
        }))
    }

    fn merge(&self, contribution: &mut IncomeConsumption, (kind, amount): (AmountKind, i64)) {
        match kind {
            AmountKind::Consumption => contribution.consumption = Some(amount),
            AmountKind::Income => contribution.income = Some(amount),
        }
    }

    fn apply(&self, record: &mut AdminDongRecord, contribution: &IncomeConsumption) {
        record.set_income_consumption(contribution.income, contribution.consumption);
    }
}

#[cfg(test)]
mod tests {
    use district_stats_collect_models::CollectionStatus;
    use district_stats_database::AnalysisStore;
    use district_stats_database::memory::MemoryStore;
    use district_stats_source::progress::NullProgress;

    use super::*;
    use crate::engine::run_stage;
    use crate::testing::{FlakyStore, ScriptedSource, amount_row, fast_options, stub_registry};

    async fn run(
        registry: &GeoRegistry,
        source: &ScriptedSource,
        store: &mut dyn AnalysisStore,
    ) -> CollectionProgress {
        let request = IncomeConsumptionRequest {
            cities: vec!["서울".to_string()],
            options: fast_options(),
        };
        run_stage(
            &IncomeConsumptionStage::new(&request),
            registry,
            source,
            store,
            request.options,
            &NullProgress,
        )
        .await
    }

    #[tokio::test]
    async fn two_calls_per_box() {
        let registry = stub_registry(3, 4);
        let source = ScriptedSource::new();
        let mut store = MemoryStore::new();

        let progress = run(&registry, &source, &mut store).await;

        assert_eq!(progress.total_api_calls, 6);
        assert_eq!(progress.success_api_calls, 6);
        assert_eq!(
            source.calls()[..2],
            [
                "consumption [0..1000, 0..1000]".to_string(),
                "income [0..1000, 0..1000]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn updates_existing_record() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_consumption(vec![amount_row("11110515", "Cheongun-dong", "2,500")])
            .with_income(vec![amount_row("11110515", "Cheongun-dong", "1,234")]);
        let mut store =
            MemoryStore::with_records([AdminDongRecord::new(11_110_515, "Cheongun-dong")]);

        let progress = run(&registry, &source, &mut store).await;

        let record = store.get(11_110_515).unwrap();
        assert_eq!(record.income, Some(12_340_000));
        assert_eq!(record.consumption, Some(25_000_000));
        assert_eq!(progress.success_records, 1);
        assert_eq!(progress.status, CollectionStatus::Completed);
    }

    #[tokio::test]
    async fn missing_record_is_never_created() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_income(vec![amount_row("11010000", "Somewhere-dong", "1,234")]);
        let mut store = MemoryStore::new();

        let progress = run(&registry, &source, &mut store).await;

        assert!(store.find_by_key(11_010_000).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(progress.total_records, 1);
        assert_eq!(progress.failure_records, 1);
        assert_eq!(progress.warnings.len(), 1);
        assert_eq!(progress.status, CollectionStatus::PartialSuccess);
    }

    #[tokio::test]
    async fn last_row_wins_within_a_run() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new().with_income(vec![
            amount_row("11110515", "Cheongun-dong", "1"),
            amount_row("11110515", "Cheongun-dong", "2"),
        ]);
        let mut store =
            MemoryStore::with_records([AdminDongRecord::new(11_110_515, "Cheongun-dong")]);

        run(&registry, &source, &mut store).await;

        assert_eq!(store.get(11_110_515).unwrap().income, Some(20_000));
        assert_eq!(store.get(11_110_515).unwrap().consumption, None);
    }

    #[tokio::test]
    async fn lookup_failure_at_persist_fails_the_record() {
        let registry = stub_registry(1, 1);
        let source = ScriptedSource::new()
            .with_income(vec![amount_row("11110515", "Cheongun-dong", "1,234")]);
        let mut store = FlakyStore::new(MemoryStore::with_records([AdminDongRecord::new(
            11_110_515,
            "Cheongun-dong",
        )]))
        .fail_lookups_from(11_110_515, 1);

        let progress = run(&registry, &source, &mut store).await;

        assert_eq!(progress.status, CollectionStatus::PartialSuccess);
        assert_eq!(progress.total_records, 1);
        assert_eq!(progress.failure_records, 1);
        assert_eq!(progress.success_records, 0);
        assert!(
            progress.error_messages[0]
                .starts_with("INCOME_CONSUMPTION: lookup of 11110515 failed:")
        );
        assert_eq!(store.get(11_110_515).unwrap().income, None);
    }
}
