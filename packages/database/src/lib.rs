#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Storage for per-district analysis records.
//!
//! The collectors see storage only through [`AnalysisStore`]: a lookup by
//! admin-dong code and an upsert. [`memory::MemoryStore`] backs tests and
//! dry runs; [`analysis_db::DuckDbStore`] persists to a local `DuckDB`
//! file.

pub mod analysis_db;
pub mod memory;
pub mod paths;

use district_stats_analysis_models::AdminDongRecord;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// JSON column (de)serialization failed.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Keyed storage of [`AdminDongRecord`]s.
///
/// Reads and writes are not transactional across calls: a record found by
/// [`find_by_key`](Self::find_by_key) may be changed or removed by another
/// writer before the matching [`upsert`](Self::upsert).
pub trait AnalysisStore: Send {
    /// Looks up the record for an admin-dong code.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the lookup fails.
    fn find_by_key(&self, adm_dong_code: i64) -> Result<Option<AdminDongRecord>, DbError>;

    /// Inserts the record, or replaces the stored record with the same
    /// admin-dong code.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    fn upsert(&mut self, record: &AdminDongRecord) -> Result<(), DbError>;

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count(&self) -> Result<u64, DbError>;
}
