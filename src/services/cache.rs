use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::models::energy_log::EnergyLogRecord;

/// Per-user read cache for log listings and by-date lookups.
///
/// Invalidation is coarse: any save for a user drops everything cached for
/// that user. Entries also expire `ttl` after the user's bucket was filled.
///
/// Each invalidation bumps the user's generation. Readers take the generation
/// before going to the store and pass it back when filling; a fill for an
/// older generation is discarded, so a read that raced a save cannot put the
/// pre-save result back.
#[derive(Clone)]
pub struct LogCache {
    inner: Arc<Mutex<CacheState>>,
    ttl: Duration,
}

#[derive(Default)]
struct CacheState {
    users: HashMap<String, UserEntries>,
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn generation(&self, user_id: &str) -> u64 {
        self.generations.get(user_id).copied().unwrap_or(0)
    }
}

struct UserEntries {
    recent: HashMap<i64, Vec<EnergyLogRecord>>,
    by_date: HashMap<NaiveDate, Option<EnergyLogRecord>>,
    filled_at: Instant,
}

impl UserEntries {
    fn new(now: Instant) -> Self {
        Self {
            recent: HashMap::new(),
            by_date: HashMap::new(),
            filled_at: now,
        }
    }
}

impl LogCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState::default())),
            ttl,
        }
    }

    /// Token to hand back to `store_recent`/`store_by_date`.
    pub async fn generation(&self, user_id: &str) -> u64 {
        self.inner.lock().await.generation(user_id)
    }

    pub async fn recent(&self, user_id: &str, count: i64) -> Option<Vec<EnergyLogRecord>> {
        let state = self.inner.lock().await;
        state
            .users
            .get(user_id)
            .filter(|entries| entries.filled_at.elapsed() < self.ttl)
            .and_then(|entries| entries.recent.get(&count).cloned())
    }

    pub async fn store_recent(
        &self,
        user_id: &str,
        generation: u64,
        count: i64,
        logs: Vec<EnergyLogRecord>,
    ) {
        let mut state = self.inner.lock().await;
        if let Some(entries) = self.fresh_bucket(&mut state, user_id, generation) {
            entries.recent.insert(count, logs);
        }
    }

    /// `Some(None)` is a cached "no log for that date".
    pub async fn by_date(
        &self,
        user_id: &str,
        log_date: NaiveDate,
    ) -> Option<Option<EnergyLogRecord>> {
        let state = self.inner.lock().await;
        state
            .users
            .get(user_id)
            .filter(|entries| entries.filled_at.elapsed() < self.ttl)
            .and_then(|entries| entries.by_date.get(&log_date).cloned())
    }

    pub async fn store_by_date(
        &self,
        user_id: &str,
        generation: u64,
        log_date: NaiveDate,
        log: Option<EnergyLogRecord>,
    ) {
        let mut state = self.inner.lock().await;
        if let Some(entries) = self.fresh_bucket(&mut state, user_id, generation) {
            entries.by_date.insert(log_date, log);
        }
    }

    pub async fn invalidate_user(&self, user_id: &str) {
        let mut state = self.inner.lock().await;
        *state.generations.entry(user_id.to_string()).or_insert(0) += 1;
        if state.users.remove(user_id).is_some() {
            tracing::debug!(user_id = %user_id, "Log cache invalidated");
        }
    }

    /// Drop expired user buckets; returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut state = self.inner.lock().await;
        let before = state.users.len();
        state
            .users
            .retain(|_, entries| entries.filled_at.elapsed() < self.ttl);
        before - state.users.len()
    }

    /// `None` when the caller's generation is stale.
    fn fresh_bucket<'a>(
        &self,
        state: &'a mut CacheState,
        user_id: &str,
        generation: u64,
    ) -> Option<&'a mut UserEntries> {
        if state.generation(user_id) != generation {
            tracing::debug!(user_id = %user_id, "Discarding cache fill from before an invalidation");
            return None;
        }

        let now = Instant::now();
        let entries = state
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntries::new(now));
        if now.duration_since(entries.filled_at) >= self.ttl {
            *entries = UserEntries::new(now);
        }
        Some(entries)
    }
}
