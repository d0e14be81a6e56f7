//! Live progress reporting for collection stages.
//!
//! Stages report planned and completed API calls through
//! [`ProgressCallback`] so the rendering backend (an `indicatif` bar in
//! the CLI, nothing in tests) stays out of the collection code. The final
//! counters are returned separately as a `CollectionProgress` value.

use std::sync::Arc;

/// Receives progress updates from a running stage.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of API calls the stage plans to make.
    fn set_total(&self, total: u64);

    /// Advances by `delta` completed calls.
    fn inc(&self, delta: u64);

    /// Describes the call in flight.
    fn set_message(&self, msg: String);

    /// Marks the stage as finished with a summary line.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
