use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{LogStore, StorageError};
use crate::models::energy_log::{EnergyLogEntry, EnergyLogRecord, StreakStatus};

/// Process-local store used when no database is configured. Logs are lost on
/// restart.
#[derive(Clone, Default)]
pub struct InMemoryLogStore {
    logs: Arc<Mutex<BTreeMap<(String, NaiveDate), EnergyLogRecord>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn upsert(
        &self,
        user_id: &str,
        log_date: NaiveDate,
        entry: &EnergyLogEntry,
        streak: &StreakStatus,
    ) -> Result<EnergyLogRecord, StorageError> {
        let mut logs = self.logs.lock().await;
        let now = Utc::now();

        let record = match logs.get(&(user_id.to_string(), log_date)) {
            Some(existing) => EnergyLogRecord {
                entry: entry.clone(),
                log_streak_count: Some(streak.log_streak_count),
                reward_badge: streak.reward_badge.clone(),
                updated_at: now,
                ..existing.clone()
            },
            None => EnergyLogRecord {
                id: Uuid::new_v4(),
                user_identifier: user_id.to_string(),
                log_date,
                entry: entry.clone(),
                log_streak_count: Some(streak.log_streak_count),
                reward_badge: streak.reward_badge.clone(),
                created_at: now,
                updated_at: now,
            },
        };

        logs.insert((user_id.to_string(), log_date), record.clone());
        Ok(record)
    }

    async fn get_by_date(
        &self,
        user_id: &str,
        log_date: NaiveDate,
    ) -> Result<Option<EnergyLogRecord>, StorageError> {
        let logs = self.logs.lock().await;
        Ok(logs.get(&(user_id.to_string(), log_date)).cloned())
    }

    async fn get_recent(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<EnergyLogRecord>, StorageError> {
        let logs = self.logs.lock().await;
        Ok(logs
            .values()
            .rev()
            .filter(|log| log.user_identifier == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn logged_dates_before(
        &self,
        user_id: &str,
        before: NaiveDate,
        limit: i64,
    ) -> Result<Vec<NaiveDate>, StorageError> {
        let logs = self.logs.lock().await;
        Ok(logs
            .keys()
            .rev()
            .filter(|(user, date)| user == user_id && *date < before)
            .take(limit.max(0) as usize)
            .map(|(_, date)| *date)
            .collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::energy_log::tests::{full_submission, minimal_submission};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn no_streak() -> StreakStatus {
        StreakStatus {
            log_streak_count: 1,
            reward_badge: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_keeps_identity() {
        let store = InMemoryLogStore::new();
        let first = store
            .upsert("u1", day(3), &full_submission().normalize().unwrap(), &no_streak())
            .await
            .unwrap();
        let minimal = minimal_submission(4).normalize().unwrap();
        let second = store.upsert("u1", day(3), &minimal, &no_streak()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.entry, minimal);
        assert_eq!(store.get_recent("u1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recent_is_scoped_to_user_and_descending() {
        let store = InMemoryLogStore::new();
        let entry = minimal_submission(5).normalize().unwrap();
        for d in [2, 9, 5] {
            store.upsert("u1", day(d), &entry, &no_streak()).await.unwrap();
        }
        store.upsert("u2", day(12), &entry, &no_streak()).await.unwrap();

        let dates: Vec<_> = store
            .get_recent("u1", 2)
            .await
            .unwrap()
            .iter()
            .map(|r| r.log_date)
            .collect();
        assert_eq!(dates, vec![day(9), day(5)]);

        let before = store.logged_dates_before("u1", day(9), 10).await.unwrap();
        assert_eq!(before, vec![day(5), day(2)]);
    }
}
