//! In-memory [`AnalysisStore`].

use std::collections::BTreeMap;

use district_stats_analysis_models::AdminDongRecord;

use crate::{AnalysisStore, DbError};

/// An [`AnalysisStore`] backed by an ordered map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<i64, AdminDongRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Creates a store pre-populated with `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = AdminDongRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.adm_dong_code, r))
                .collect(),
        }
    }

    /// Borrows the stored record for a code.
    #[must_use]
    pub fn get(&self, adm_dong_code: i64) -> Option<&AdminDongRecord> {
        self.records.get(&adm_dong_code)
    }

    /// Removes and returns the stored record for a code.
    pub fn remove(&mut self, adm_dong_code: i64) -> Option<AdminDongRecord> {
        self.records.remove(&adm_dong_code)
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AnalysisStore for MemoryStore {
    fn find_by_key(&self, adm_dong_code: i64) -> Result<Option<AdminDongRecord>, DbError> {
        Ok(self.records.get(&adm_dong_code).cloned())
    }

    fn upsert(&mut self, record: &AdminDongRecord) -> Result<(), DbError> {
        self.records.insert(record.adm_dong_code, record.clone());
        Ok(())
    }

    fn count(&self) -> Result<u64, DbError> {
        Ok(self.records.len() as u64)
    }
}
