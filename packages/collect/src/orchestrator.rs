//! Stage sequencing and overall status.
//!
//! [`Collector`] runs the enabled stages in fixed order (sales, then
//! income/consumption, then business/population), folds each stage's
//! progress into a pipeline-level total and derives the overall status:
//! a failed sales stage aborts the run, any later failed or partial stage
//! downgrades it to `PARTIAL_SUCCESS`.

use std::sync::Arc;

use district_stats_collect_models::{
    BusinessPopulationRequest, CollectOptions, CollectionProgress, CollectionRequest,
    CollectionStage, CollectionStatus, IncomeConsumptionRequest, SalesRequest,
};
use district_stats_database::AnalysisStore;
use district_stats_geography::GeoRegistry;
use district_stats_source::StatsSource;
use district_stats_source::progress::{ProgressCallback, null_progress};

use crate::CollectError;
use crate::business::BusinessPopulationStage;
use crate::engine::{Stage, run_stage};
use crate::income::IncomeConsumptionStage;
use crate::sales::SalesStage;

/// Creates the progress reporter for a stage about to start.
pub type ReporterFactory<'a> = Box<dyn Fn(CollectionStage) -> Arc<dyn ProgressCallback> + 'a>;

/// Runs collection stages against one source and one store.
pub struct Collector<'a> {
    registry: &'a GeoRegistry,
    source: &'a dyn StatsSource,
    store: &'a mut dyn AnalysisStore,
    reporter: Option<ReporterFactory<'a>>,
}

impl<'a> Collector<'a> {
    #[must_use]
    pub fn new(
        registry: &'a GeoRegistry,
        source: &'a dyn StatsSource,
        store: &'a mut dyn AnalysisStore,
    ) -> Self {
        Self {
            registry,
            source,
            store,
            reporter: None,
        }
    }

    /// Reports each stage's calls through the callbacks `factory` creates.
    #[must_use]
    pub fn with_reporter(
        mut self,
        factory: impl Fn(CollectionStage) -> Arc<dyn ProgressCallback> + 'a,
    ) -> Self {
        self.reporter = Some(Box::new(factory));
        self
    }

    async fn run<S: Stage>(&mut self, stage: &S, options: CollectOptions) -> CollectionProgress {
        let reporter = self
            .reporter
            .as_ref()
            .map_or_else(null_progress, |factory| factory(S::STAGE));
        log::info!("Starting {} stage", S::STAGE);
        run_stage(
            stage,
            self.registry,
            self.source,
            &mut *self.store,
            options,
            reporter.as_ref(),
        )
        .await
    }

    /// Runs the sales stage.
    pub async fn collect_sales(&mut self, request: &SalesRequest) -> CollectionProgress {
        self.run(&SalesStage::new(request), request.options).await
    }

    /// Runs the income/consumption stage.
    pub async fn collect_income_consumption(
        &mut self,
        request: &IncomeConsumptionRequest,
    ) -> CollectionProgress {
        self.run(&IncomeConsumptionStage::new(request), request.options)
            .await
    }

    /// Runs the business/population stage.
    pub async fn collect_business_population(
        &mut self,
        request: &BusinessPopulationRequest,
    ) -> CollectionProgress {
        self.run(&BusinessPopulationStage::new(request), request.options)
            .await
    }

    async fn collect_stage(
        &mut self,
        stage: CollectionStage,
        request: &CollectionRequest,
    ) -> CollectionProgress {
        match stage {
            CollectionStage::Sales => self.collect_sales(&request.sales()).await,
            CollectionStage::IncomeConsumption => {
                self.collect_income_consumption(&request.income_consumption())
                    .await
            }
            CollectionStage::BusinessPopulation => {
                self.collect_business_population(&request.business_population())
                    .await
            }
        }
    }

    /// Runs every stage `request` enables, in pipeline order.
    pub async fn collect_integrated(&mut self, request: &CollectionRequest) -> CollectionProgress {
        let mut overall = CollectionProgress::start();
        let stages = request.enabled_stages();

        if stages.is_empty() {
            let e = CollectError::NoStagesEnabled;
            log::error!("{e}");
            overall.fail(e.to_string());
            return overall;
        }

        overall.set_total_steps(u32::try_from(stages.len()).unwrap_or(u32::MAX));
        let mut status = CollectionStatus::Completed;

        for stage in stages {
            overall.current_stage = Some(stage);
            let progress = self.collect_stage(stage, request).await;
            overall.merge_stage(stage, &progress);

            match (stage, progress.status) {
                (CollectionStage::Sales, CollectionStatus::Failed) => {
                    let message = "Sales stage failed; remaining stages skipped";
                    log::error!("{message}");
                    overall.fail(message);
                    return overall;
                }
                (_, CollectionStatus::Failed | CollectionStatus::PartialSuccess) => {
                    log::warn!("{stage} stage ended {}", progress.status);
                    status = CollectionStatus::PartialSuccess;
                }
                _ => {}
            }
        }

        overall.finish(status);
        log::info!(
            "Collection finished: {} in {:.1}s ({} of {} calls ok, {} records ok)",
            overall.status,
            overall.elapsed().to_std().unwrap_or_default().as_secs_f64(),
            overall.success_api_calls,
            overall.total_api_calls,
            overall.success_records,
        );
        overall
    }

    /// Runs every stage over every configured city and area code with
    /// default retry and pacing.
    pub async fn collect_all(&mut self) -> CollectionProgress {
        let request = CollectionRequest {
            cities: self.registry.cities(),
            area_codes: self.registry.area_codes(),
            ..CollectionRequest::default()
        };
        self.collect_integrated(&request).await
    }
}
