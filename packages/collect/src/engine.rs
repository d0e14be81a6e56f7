//! Generic stage engine.
//!
//! A [`Stage`] describes what to call and how to fold the answers into
//! per-district contributions. [`run_stage`] drives it: planning,
//! fetching with bounded retries and pacing, accumulating into a local
//! map keyed by admin-dong code, and finally persisting each district
//! once according to the stage's [`PersistPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use district_stats_analysis_models::AdminDongRecord;
use district_stats_collect_models::{CollectOptions, CollectionProgress, CollectionStage};
use district_stats_database::AnalysisStore;
use district_stats_geography::GeoRegistry;
use district_stats_geography_models::GeoBox;
use district_stats_source::progress::ProgressCallback;
use district_stats_source::{SourceError, StatsSource, retry};

use crate::StageError;

/// Whether a stage may create records, and when it checks for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Missing records are created, seeded with the observed name.
    CreateOrUpdate,
    /// Missing records are detected at persist time; the contribution is
    /// dropped and counted as a failed record.
    UpdateOnly,
    /// Every row's record is looked up before it is accumulated; rows for
    /// missing records are dropped without building any state.
    UpdateOnlyScreened,
}

/// One district-level value extracted from a response row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow<V> {
    /// Admin-dong code.
    pub code: i64,
    /// District name as reported by the API.
    pub name: String,
    /// The stage-specific value.
    pub value: V,
}

/// A collection stage: enumeration, fetching, parsing and merging.
#[async_trait]
pub trait Stage: Send + Sync {
    /// One logical API call.
    type Call: Send + Sync;
    /// One raw response row.
    type Row: Send;
    /// The value a single row contributes.
    type Value;
    /// Everything accumulated for one district during a run.
    type Contribution: Default;

    /// Which stage this is.
    const STAGE: CollectionStage;

    /// Persistence policy.
    const POLICY: PersistPolicy;

    /// Enumerates the calls of this run, in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the request or registry leaves nothing
    /// to call.
    fn plan(
        &self,
        registry: &GeoRegistry,
        progress: &mut CollectionProgress,
    ) -> Result<Vec<Self::Call>, StageError>;

    /// Short label for logs and progress messages.
    fn describe(&self, call: &Self::Call) -> String;

    /// Performs one attempt of `call`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the call fails.
    async fn fetch(
        &self,
        source: &dyn StatsSource,
        call: &Self::Call,
    ) -> Result<Vec<Self::Row>, SourceError>;

    /// Extracts a district value from a row.
    ///
    /// `Ok(None)` skips the row (invalid district, sub-district code or no
    /// data).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Parse`] for a malformed numeric field.
    fn parse(
        &self,
        call: &Self::Call,
        row: &Self::Row,
    ) -> Result<Option<ParsedRow<Self::Value>>, SourceError>;

    /// Folds a parsed value into the district's contribution.
    fn merge(&self, contribution: &mut Self::Contribution, value: Self::Value);

    /// Writes a finished contribution onto a record.
    fn apply(&self, record: &mut AdminDongRecord, contribution: &Self::Contribution);
}

struct Accumulated<C> {
    name: String,
    contribution: C,
}

/// Runs `stage` to completion and returns its progress.
///
/// Never fails: configuration errors, call failures and record failures
/// all end up in the returned [`CollectionProgress`].
pub async fn run_stage<S: Stage>(
    stage: &S,
    registry: &GeoRegistry,
    source: &dyn StatsSource,
    store: &mut dyn AnalysisStore,
    options: CollectOptions,
    reporter: &dyn ProgressCallback,
) -> CollectionProgress {
    let mut progress = CollectionProgress::for_stage(S::STAGE);

    let calls = match stage.plan(registry, &mut progress) {
        Ok(calls) => calls,
        Err(e) => {
            log::error!("{}: {e}", S::STAGE);
            progress.fail(format!("{}: {e}", S::STAGE));
            reporter.finish(format!("{} failed: {e}", S::STAGE.label()));
            return progress;
        }
    };

    log::info!(
        "{}: {} API call(s) planned (retry_count={}, delay={}ms)",
        S::STAGE,
        calls.len(),
        options.retry_count,
        options.delay_ms,
    );
    progress.plan_api_calls(calls.len() as u64);
    reporter.set_total(calls.len() as u64);

    let delay = Duration::from_millis(options.delay_ms);
    let mut accumulator: BTreeMap<i64, Accumulated<S::Contribution>> = BTreeMap::new();
    let mut dropped: BTreeSet<i64> = BTreeSet::new();

    for call in &calls {
        let label = stage.describe(call);
        reporter.set_message(label.clone());

        match retry::with_retries(&label, options.retry_count, delay, || {
            stage.fetch(source, call)
        })
        .await
        {
            Ok(rows) => {
                progress.record_api_success();
                log::debug!("{label}: {} row(s)", rows.len());
                for row in &rows {
                    absorb_row(
                        stage,
                        call,
                        row,
                        &label,
                        &*store,
                        &mut accumulator,
                        &mut dropped,
                        &mut progress,
                    );
                }
            }
            Err(e) => {
                log::warn!("{label}: {e}");
                progress.record_api_failure(format!("{label}: {e}"));
            }
        }

        reporter.inc(1);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    persist(stage, store, accumulator, &mut progress);
    progress.finish_derived();

    log::info!(
        "{}: {} - calls {}/{} ok, records {} ok / {} failed",
        S::STAGE,
        progress.status,
        progress.success_api_calls,
        progress.total_api_calls,
        progress.success_records,
        progress.failure_records,
    );
    reporter.finish(format!(
        "{}: {} ({} records)",
        S::STAGE.label(),
        progress.status,
        progress.success_records,
    ));

    progress
}

#[allow(clippy::too_many_arguments)]
fn absorb_row<S: Stage>(
    stage: &S,
    call: &S::Call,
    row: &S::Row,
    label: &str,
    store: &dyn AnalysisStore,
    accumulator: &mut BTreeMap<i64, Accumulated<S::Contribution>>,
    dropped: &mut BTreeSet<i64>,
    progress: &mut CollectionProgress,
) {
    let parsed = match stage.parse(call, row) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return,
        Err(e) => {
            let message = format!("{label}: skipped row: {e}");
            log::warn!("{message}");
            progress.warn(message);
            return;
        }
    };

    if S::POLICY == PersistPolicy::UpdateOnlyScreened && !accumulator.contains_key(&parsed.code) {
        if dropped.contains(&parsed.code) {
            return;
        }
        match store.find_by_key(parsed.code) {
            Ok(Some(_)) => {}
            Ok(None) => {
                dropped.insert(parsed.code);
                let message = format!(
                    "{}: no analysis record for {} ({}); contribution dropped",
                    S::STAGE,
                    parsed.code,
                    parsed.name,
                );
                log::warn!("{message}");
                progress.record_missing_target(message);
                return;
            }
            Err(e) => {
                dropped.insert(parsed.code);
                let message = format!("{}: lookup of {} failed: {e}", S::STAGE, parsed.code);
                log::error!("{message}");
                progress.plan_records(1);
                progress.record_record_outcome(false);
                progress.error(message);
                return;
            }
        }
    }

    let entry = accumulator
        .entry(parsed.code)
        .or_insert_with(|| Accumulated {
            name: parsed.name,
            contribution: S::Contribution::default(),
        });
    stage.merge(&mut entry.contribution, parsed.value);
}

fn persist<S: Stage>(
    stage: &S,
    store: &mut dyn AnalysisStore,
    accumulator: BTreeMap<i64, Accumulated<S::Contribution>>,
    progress: &mut CollectionProgress,
) {
    progress.plan_records(accumulator.len() as u64);

    for (code, accumulated) in accumulator {
        let existing = match store.find_by_key(code) {
            Ok(existing) => existing,
            Err(e) => {
                let message = format!("{}: lookup of {code} failed: {e}", S::STAGE);
                log::error!("{message}");
                progress.error(message);
                progress.record_record_outcome(false);
                continue;
            }
        };

        let mut record = match (existing, S::POLICY) {
            (Some(record), _) => record,
            (None, PersistPolicy::CreateOrUpdate) => {
                log::debug!("{}: creating record {code} ({})", S::STAGE, accumulated.name);
                AdminDongRecord::new(code, accumulated.name)
            }
            (None, PersistPolicy::UpdateOnly) => {
                let message = format!(
                    "{}: no analysis record for {code} ({}); contribution dropped",
                    S::STAGE,
                    accumulated.name,
                );
                log::warn!("{message}");
                progress.warn(message);
                progress.record_record_outcome(false);
                continue;
            }
            (None, PersistPolicy::UpdateOnlyScreened) => {
                let message = format!(
                    "{}: analysis record {code} disappeared before persist",
                    S::STAGE,
                );
                log::warn!("{message}");
                progress.warn(message);
                progress.record_record_outcome(false);
                continue;
            }
        };

        stage.apply(&mut record, &accumulated.contribution);

        match store.upsert(&record) {
            Ok(()) => progress.record_record_outcome(true),
            Err(e) => {
                let message = format!("{}: saving {code} failed: {e}", S::STAGE);
                log::error!("{message}");
                progress.error(message);
                progress.record_record_outcome(false);
            }
        }
    }
}

/// One grid box of one city, as enumerated by the box-based stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityBox {
    /// Canonical city id.
    pub city: String,
    /// Position of the box in the city's grid (0-based).
    pub index: usize,
    /// The box itself.
    pub geo_box: GeoBox,
}

impl std::fmt::Display for CityBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.city, self.index)
    }
}

/// Resolves requested city names to their grid boxes, in request order.
///
/// Unknown cities are reported as warnings.
///
/// # Errors
///
/// Returns [`StageError::NoCities`] for an empty request and
/// [`StageError::NoBoxes`] if no requested city has a box.
pub fn city_boxes(
    registry: &GeoRegistry,
    cities: &[String],
    progress: &mut CollectionProgress,
) -> Result<Vec<CityBox>, StageError> {
    if cities.is_empty() {
        return Err(StageError::NoCities);
    }

    let mut boxes = Vec::new();
    for requested in cities {
        let Some(grid) = registry.grid(requested) else {
            let message = format!("Unknown city {requested:?}; skipped");
            log::warn!("{message}");
            progress.warn(message);
            continue;
        };
        boxes.extend(
            registry
                .boxes_for(requested)
                .iter()
                .enumerate()
                .map(|(index, geo_box)| CityBox {
                    city: grid.id.clone(),
                    index,
                    geo_box: *geo_box,
                }),
        );
    }

    if boxes.is_empty() {
        return Err(StageError::NoBoxes(cities.to_vec()));
    }
    Ok(boxes)
}
