//! `DuckDB`-backed [`AnalysisStore`].
//!
//! One `admin_dong_analysis` table keyed by `adm_dong_code`. Per-category
//! sales figures and business counts are stored as JSON text columns since
//! the category set is configuration, not schema. Timestamps are stored as
//! RFC 3339 text.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use district_stats_analysis_models::{AdminDongRecord, SalesFigures};
use duckdb::Connection;

use crate::{AnalysisStore, DbError};

/// An [`AnalysisStore`] persisting to a `DuckDB` database.
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    /// Opens (or creates) the database at `path` and ensures the schema
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection or schema cannot be
    /// created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        log::debug!("Opened analysis database {}", path.display());
        Ok(Self { conn })
    }

    /// Opens the database at the default path (see
    /// [`crate::paths::analysis_db_path`]).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened.
    pub fn open_default() -> Result<Self, DbError> {
        Self::open(&crate::paths::analysis_db_path())
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS admin_dong_analysis (
            adm_dong_code BIGINT NOT NULL PRIMARY KEY,
            adm_dong_name TEXT NOT NULL,
            sales TEXT NOT NULL,
            business_counts TEXT NOT NULL,
            floating_population BIGINT,
            residential_population BIGINT,
            working_population BIGINT,
            household_count BIGINT,
            income BIGINT,
            consumption BIGINT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Raw column values of one `admin_dong_analysis` row.
struct RawRow {
    code: i64,
    name: String,
    sales: String,
    business_counts: String,
    floating_population: Option<i64>,
    residential_population: Option<i64>,
    working_population: Option<i64>,
    household_count: Option<i64>,
    income: Option<i64>,
    consumption: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<AdminDongRecord, DbError> {
        let sales: BTreeMap<String, SalesFigures> = serde_json::from_str(&self.sales)?;
        let business_counts: BTreeMap<String, i64> =
            serde_json::from_str(&self.business_counts)?;
        Ok(AdminDongRecord {
            adm_dong_code: self.code,
            adm_dong_name: self.name,
            sales,
            business_counts,
            floating_population: self.floating_population,
            residential_population: self.residential_population,
            working_population: self.working_population,
            household_count: self.household_count,
            income: self.income,
            consumption: self.consumption,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Conversion {
            message: format!("invalid timestamp {s:?}: {e}"),
        })
}

impl AnalysisStore for DuckDbStore {
    fn find_by_key(&self, adm_dong_code: i64) -> Result<Option<AdminDongRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT adm_dong_code, adm_dong_name, sales, business_counts,
                    floating_population, residential_population, working_population,
                    household_count, income, consumption, created_at, updated_at
             FROM admin_dong_analysis
             WHERE adm_dong_code = ?",
        )?;
        let result = stmt.query_row([adm_dong_code], |row| {
            Ok(RawRow {
                code: row.get(0)?,
                name: row.get(1)?,
                sales: row.get(2)?,
                business_counts: row.get(3)?,
                floating_population: row.get(4)?,
                residential_population: row.get(5)?,
                working_population: row.get(6)?,
                household_count: row.get(7)?,
                income: row.get(8)?,
                consumption: row.get(9)?,
                created_at: row.get(10)?,
                updated_at: row.get(11)?,
            })
        });
        match result {
            Ok(raw) => raw.into_record().map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::DuckDb(e)),
        }
    }

    fn upsert(&mut self, record: &AdminDongRecord) -> Result<(), DbError> {
        let sales = serde_json::to_string(&record.sales)?;
        let business_counts = serde_json::to_string(&record.business_counts)?;
        self.conn.execute(
            "INSERT INTO admin_dong_analysis (
                adm_dong_code, adm_dong_name, sales, business_counts,
                floating_population, residential_population, working_population,
                household_count, income, consumption, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (adm_dong_code) DO UPDATE SET
                adm_dong_name = EXCLUDED.adm_dong_name,
                sales = EXCLUDED.sales,
                business_counts = EXCLUDED.business_counts,
                floating_population = EXCLUDED.floating_population,
                residential_population = EXCLUDED.residential_population,
                working_population = EXCLUDED.working_population,
                household_count = EXCLUDED.household_count,
                income = EXCLUDED.income,
                consumption = EXCLUDED.consumption,
                updated_at = EXCLUDED.updated_at",
            duckdb::params![
                record.adm_dong_code,
                record.adm_dong_name,
                sales,
                business_counts,
                record.floating_population,
                record.residential_population,
                record.working_population,
                record.household_count,
                record.income,
                record.consumption,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn count(&self) -> Result<u64, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM admin_dong_analysis")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative row count {count}: {e}"),
        })
    }
}
