use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use validator::ValidationErrors;

use crate::db::{LogStore, StorageError};
use crate::models::energy_log::{EnergyLogRecord, LogSubmission, StreakStatus};
use crate::services::cache::LogCache;

pub const DEFAULT_RECENT_COUNT: i64 = 7;
pub const MAX_RECENT_COUNT: i64 = 90;

/// How far back a streak is counted.
const STREAK_LOOKBACK_DAYS: i64 = 365;

/// Milestones, highest first.
const BADGES: &[(i32, &str)] = &[
    (100, "Century Club"),
    (30, "Monthly Momentum"),
    (14, "Fortnight Flow"),
    (7, "Week Warrior"),
    (3, "Getting Started"),
];

/// Result of a save: validation failures are returned as `Err` before this is
/// built, storage failures land here with `success = false`.
#[derive(Debug, Serialize)]
pub struct SaveOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<EnergyLogRecord>,
}

impl SaveOutcome {
    fn failed(error: StorageError) -> Self {
        Self {
            success: false,
            message: format!("Failed to save log: {}", error),
            error: Some(error.to_string()),
            log: None,
        }
    }
}

pub fn badge_for(streak: i32) -> Option<&'static str> {
    BADGES
        .iter()
        .find(|(threshold, _)| streak >= *threshold)
        .map(|(_, badge)| *badge)
}

/// Consecutive logged days ending at `log_date`, given earlier logged dates
/// in descending order.
pub fn streak_for(log_date: NaiveDate, earlier_dates: &[NaiveDate]) -> StreakStatus {
    let mut streak = 1;
    let mut expected = log_date - Duration::days(1);

    for date in earlier_dates {
        if *date == expected {
            streak += 1;
            expected -= Duration::days(1);
        } else if *date < expected {
            break;
        }
    }

    StreakStatus {
        log_streak_count: streak,
        reward_badge: badge_for(streak).map(str::to_string),
    }
}

/// Validates, persists and reads energy logs for an explicit user.
#[derive(Clone)]
pub struct LogGateway {
    store: Arc<dyn LogStore>,
    cache: LogCache,
}

impl LogGateway {
    pub fn new(store: Arc<dyn LogStore>, cache: LogCache) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &LogCache {
        &self.cache
    }

    pub async fn save(
        &self,
        user_id: &str,
        log_date: NaiveDate,
        submission: LogSubmission,
    ) -> Result<SaveOutcome, ValidationErrors> {
        let entry = submission.normalize()?;

        let earlier = match self
            .store
            .logged_dates_before(user_id, log_date, STREAK_LOOKBACK_DAYS)
            .await
        {
            Ok(dates) => dates,
            Err(e) => {
                tracing::error!(user_id = %user_id, %log_date, error = %e, "Streak lookup failed");
                return Ok(SaveOutcome::failed(e));
            }
        };
        let streak = streak_for(log_date, &earlier);

        match self.store.upsert(user_id, log_date, &entry, &streak).await {
            Ok(log) => {
                self.cache.invalidate_user(user_id).await;
                tracing::info!(
                    user_id = %user_id,
                    %log_date,
                    streak = streak.log_streak_count,
                    "Energy log saved"
                );
                Ok(SaveOutcome {
                    success: true,
                    message: "Energy log saved successfully!".into(),
                    error: None,
                    log: Some(log),
                })
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, %log_date, error = %e, "Energy log upsert failed");
                Ok(SaveOutcome::failed(e))
            }
        }
    }

    /// `Ok(None)` when the user has no log for that date.
    pub async fn get_by_date(
        &self,
        user_id: &str,
        log_date: NaiveDate,
    ) -> Result<Option<EnergyLogRecord>, StorageError> {
        if let Some(cached) = self.cache.by_date(user_id, log_date).await {
            return Ok(cached);
        }

        let generation = self.cache.generation(user_id).await;
        let log = self.store.get_by_date(user_id, log_date).await?;
        self.cache
            .store_by_date(user_id, generation, log_date, log.clone())
            .await;
        Ok(log)
    }

    /// Up to `count` logs, most recent first. `count` is clamped to
    /// `0..=MAX_RECENT_COUNT`.
    pub async fn get_recent(
        &self,
        user_id: &str,
        count: i64,
    ) -> Result<Vec<EnergyLogRecord>, StorageError> {
        let count = count.clamp(0, MAX_RECENT_COUNT);
        if count == 0 {
            return Ok(Vec::new());
        }

        if let Some(cached) = self.cache.recent(user_id, count).await {
            return Ok(cached);
        }

        let generation = self.cache.generation(user_id).await;
        let logs = self.store.get_recent(user_id, count).await?;
        self.cache
            .store_recent(user_id, generation, count, logs.clone())
            .await;
        Ok(logs)
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        self.store.ping().await
    }
}
