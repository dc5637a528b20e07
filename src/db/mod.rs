use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::energy_log::{EnergyLogEntry, EnergyLogRecord, StreakStatus};

pub mod memory;
pub mod pool;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value `{value}` is not valid for column {column}")]
    CorruptRow { column: &'static str, value: String },
}

/// Storage for energy logs, keyed by (user identifier, log date).
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Insert or fully overwrite the log for `(user_id, log_date)`.
    async fn upsert(
        &self,
        user_id: &str,
        log_date: NaiveDate,
        entry: &EnergyLogEntry,
        streak: &StreakStatus,
    ) -> Result<EnergyLogRecord, StorageError>;

    async fn get_by_date(
        &self,
        user_id: &str,
        log_date: NaiveDate,
    ) -> Result<Option<EnergyLogRecord>, StorageError>;

    /// Up to `limit` logs, most recent date first.
    async fn get_recent(&self, user_id: &str, limit: i64)
        -> Result<Vec<EnergyLogRecord>, StorageError>;

    /// Dates strictly before `before` that have a log, most recent first.
    async fn logged_dates_before(
        &self,
        user_id: &str,
        before: NaiveDate,
        limit: i64,
    ) -> Result<Vec<NaiveDate>, StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;
}
