#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collection progress, status and request types.
//!
//! [`CollectionProgress`] is the value every collection entry point
//! returns: call and record counters, timestamps, status and accumulated
//! messages. Counters only move through its named operations so that
//! totals, completions and outcomes stay consistent.

pub mod request;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use request::{
    BusinessPopulationRequest, CollectOptions, CollectionRequest, DEFAULT_DELAY_MS,
    DEFAULT_RETRY_COUNT, IncomeConsumptionRequest, SalesRequest,
};

/// Status of a stage or of a whole pipeline run.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    /// Still running.
    InProgress,
    /// Finished without any failed call or record.
    Completed,
    /// Finished, but some calls, records or stages failed.
    PartialSuccess,
    /// Aborted or nothing succeeded.
    Failed,
}

/// The collection stages, in pipeline order.
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStage {
    /// Per-box, per-category sales. Creates records.
    Sales,
    /// Per-box income and consumption. Update-only.
    IncomeConsumption,
    /// Per-area business counts and population. Update-only.
    BusinessPopulation,
}

impl CollectionStage {
    /// Every stage, in pipeline order.
    pub const ALL: &[Self] = &[Self::Sales, Self::IncomeConsumption, Self::BusinessPopulation];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::IncomeConsumption => "Income & consumption",
            Self::BusinessPopulation => "Business & population",
        }
    }
}

/// Final counters of one stage, kept on the pipeline-level progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    /// Which stage ran.
    pub stage: CollectionStage,
    /// Its terminal status.
    pub status: CollectionStatus,
    /// Successful API calls.
    pub success_api_calls: u64,
    /// Failed API calls.
    pub failure_api_calls: u64,
    /// Successfully persisted records.
    pub success_records: u64,
    /// Failed or dropped records.
    pub failure_records: u64,
}

/// Counters, timestamps, status and messages of a collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionProgress {
    /// Planned API calls.
    pub total_api_calls: u64,
    /// API calls finished (successfully or not).
    pub completed_api_calls: u64,
    /// API calls that returned usable data.
    pub success_api_calls: u64,
    /// API calls that failed after every retry.
    pub failure_api_calls: u64,
    /// Districts to persist, including dropped missing targets.
    pub total_records: u64,
    /// Districts handled so far.
    pub processed_records: u64,
    /// Districts persisted successfully.
    pub success_records: u64,
    /// Districts that failed to persist or had no target record.
    pub failure_records: u64,
    /// Current status.
    pub status: CollectionStatus,
    /// Stage currently running, if any.
    pub current_stage: Option<CollectionStage>,
    /// Stages finished so far.
    pub completed_steps: u32,
    /// Stages enabled for this run (at least 1).
    pub total_steps: u32,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run finished.
    pub end_time: Option<DateTime<Utc>>,
    /// Error messages, in the order they occurred.
    pub error_messages: Vec<String>,
    /// Warnings, in the order they occurred.
    pub warnings: Vec<String>,
    /// Outcomes of the stages that ran.
    pub stages: Vec<StageOutcome>,
}

impl CollectionProgress {
    /// Starts a new in-progress run with one step.
    #[must_use]
    pub fn start() -> Self {
        Self {
            total_api_calls: 0,
            completed_api_calls: 0,
            success_api_calls: 0,
            failure_api_calls: 0,
            total_records: 0,
            processed_records: 0,
            success_records: 0,
            failure_records: 0,
            status: CollectionStatus::InProgress,
            current_stage: None,
            completed_steps: 0,
            total_steps: 1,
            start_time: Utc::now(),
            end_time: None,
            error_messages: Vec::new(),
            warnings: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Starts a new in-progress run for a single stage.
    #[must_use]
    pub fn for_stage(stage: CollectionStage) -> Self {
        let mut progress = Self::start();
        progress.current_stage = Some(stage);
        progress
    }

    /// Sets the number of enabled stages (at least 1).
    pub fn set_total_steps(&mut self, steps: u32) {
        self.total_steps = steps.max(1);
    }

    /// Adds `calls` to the planned API call count.
    pub const fn plan_api_calls(&mut self, calls: u64) {
        self.total_api_calls += calls;
    }

    /// Records a successful API call.
    pub const fn record_api_success(&mut self) {
        self.completed_api_calls += 1;
        self.success_api_calls += 1;
    }

    /// Records a failed API call and its error message.
    pub fn record_api_failure(&mut self, message: impl Into<String>) {
        self.completed_api_calls += 1;
        self.failure_api_calls += 1;
        self.error_messages.push(message.into());
    }

    /// Adds `records` to the planned record count.
    pub const fn plan_records(&mut self, records: u64) {
        self.total_records += records;
    }

    /// Records the outcome of persisting one planned record.
    pub const fn record_record_outcome(&mut self, ok: bool) {
        self.processed_records += 1;
        if ok {
            self.success_records += 1;
        } else {
            self.failure_records += 1;
        }
    }

    /// Records a district whose contribution was dropped because no target
    /// record exists. Counts as a planned, processed and failed record.
    pub fn record_missing_target(&mut self, message: impl Into<String>) {
        self.total_records += 1;
        self.record_record_outcome(false);
        self.warnings.push(message.into());
    }

    /// Appends a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Appends an error message.
    pub fn error(&mut self, message: impl Into<String>) {
        self.error_messages.push(message.into());
    }

    /// The terminal status implied by the counters: `COMPLETED` without
    /// failures, `FAILED` if every planned call failed, otherwise
    /// `PARTIAL_SUCCESS`.
    #[must_use]
    pub const fn derived_status(&self) -> CollectionStatus {
        if self.failure_api_calls == 0 && self.failure_records == 0 {
            CollectionStatus::Completed
        } else if self.total_api_calls > 0 && self.success_api_calls == 0 {
            CollectionStatus::Failed
        } else {
            CollectionStatus::PartialSuccess
        }
    }

    /// Marks the run finished with `status` and stamps the end time.
    pub fn finish(&mut self, status: CollectionStatus) {
        self.status = status;
        self.current_stage = None;
        self.end_time = Some(Utc::now());
    }

    /// Marks the run finished with its [`derived_status`](Self::derived_status).
    pub fn finish_derived(&mut self) {
        self.finish(self.derived_status());
    }

    /// Marks the run failed with an error message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error(message);
        self.finish(CollectionStatus::Failed);
    }

    /// Folds a finished stage into this pipeline-level progress: counters
    /// are summed field by field, messages concatenated, the step counter
    /// advanced and the stage outcome recorded.
    pub fn merge_stage(&mut self, stage: CollectionStage, other: &Self) {
        self.total_api_calls += other.total_api_calls;
        self.completed_api_calls += other.completed_api_calls;
        self.success_api_calls += other.success_api_calls;
        self.failure_api_calls += other.failure_api_calls;
        self.total_records += other.total_records;
        self.processed_records += other.processed_records;
        self.success_records += other.success_records;
        self.failure_records += other.failure_records;
        self.error_messages
            .extend(other.error_messages.iter().cloned());
        self.warnings.extend(other.warnings.iter().cloned());
        self.completed_steps += 1;
        self.stages.push(StageOutcome {
            stage,
            status: other.status,
            success_api_calls: other.success_api_calls,
            failure_api_calls: other.failure_api_calls,
            success_records: other.success_records,
            failure_records: other.failure_records,
        });
    }

    /// Percentage of enabled stages completed, in `0.0..=100.0`.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        f64::from(self.completed_steps.min(self.total_steps)) * 100.0
            / f64::from(self.total_steps.max(1))
    }

    /// Time from start to end (or to now, while running).
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }
}

impl Default for CollectionProgress {
    fn default() -> Self {
        Self::start()
    }
}
