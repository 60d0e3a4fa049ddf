//! Sliding-window store of raw station checks.
//!
//! Every poll appends a [`CheckRecord`]. Records are kept in memory for
//! [`RETENTION_DAYS`] and written to the backend once per cycle by
//! [`TimelineStore::flush_cycle`]. Eviction here is by age, unlike the
//! registry's transition log which is bounded by count.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::persistence::{PersistenceBackend, TimelineBatch};
use crate::station::{CheckRecord, StationStatus};
use crate::types::{cutoff_iso, Timestamp};

/// Age after which check records are discarded.
pub const RETENTION_DAYS: i64 = 3;

#[derive(Default)]
struct TimelineInner {
    /// Chronological, within the retention window after each flush.
    records: Vec<CheckRecord>,
    /// Records not yet handed to the backend.
    pending: Vec<CheckRecord>,
}

pub struct TimelineStore {
    backend: Arc<dyn PersistenceBackend>,
    inner: Mutex<TimelineInner>,
    flush_guard: Mutex<()>,
}

impl TimelineStore {
    /// Create an empty store.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(TimelineInner::default()),
            flush_guard: Mutex::new(()),
        }
    }

    /// Create a store seeded from the backend.
    ///
    /// The backend decides how much to return for the retention cutoff;
    /// anything it returns is kept until the next flush prunes it. A
    /// backend failure is logged and yields an empty store.
    pub async fn load(backend: Arc<dyn PersistenceBackend>) -> Self {
        let store = Self::new(Arc::clone(&backend));
        let cutoff = cutoff_iso(Utc::now(), RETENTION_DAYS);

        match backend.load_timeline(&cutoff).await {
            Ok(records) => {
                tracing::info!(
                    backend = backend.name(),
                    records = records.len(),
                    "Loaded timeline check records"
                );
                store.inner.lock().await.records = records;
            }
            Err(e) => {
                tracing::error!(
                    backend = backend.name(),
                    error = %e,
                    "Failed to load timeline, starting empty"
                );
            }
        }

        store
    }

    /// Append one check. Never touches the backend.
    pub async fn record_check(
        &self,
        station_id: &str,
        station_name: &str,
        status: StationStatus,
        timestamp: &str,
    ) {
        let record = CheckRecord {
            station_id: station_id.to_string(),
            station_name: station_name.to_string(),
            status,
            timestamp: timestamp.to_string(),
        };

        let mut inner = self.inner.lock().await;
        inner.pending.push(record.clone());
        inner.records.push(record);
    }

    /// Prune expired records and persist. Call once per cycle.
    pub async fn flush_cycle(&self) {
        self.flush_cycle_at(Utc::now()).await;
    }

    /// [`flush_cycle`](Self::flush_cycle) against an explicit clock.
    pub async fn flush_cycle_at(&self, now: Timestamp) {
        let _guard = self.flush_guard.lock().await;
        let cutoff = cutoff_iso(now, RETENTION_DAYS);

        let (retained, pending, pruned) = {
            let mut inner = self.inner.lock().await;
            let before = inner.records.len();
            inner.records.retain(|r| r.timestamp >= cutoff);
            inner.pending.retain(|r| r.timestamp >= cutoff);
            let pruned = before - inner.records.len();
            (
                inner.records.clone(),
                std::mem::take(&mut inner.pending),
                pruned,
            )
        };

        let batch = TimelineBatch {
            pending: &pending,
            retained: &retained,
            cutoff: &cutoff,
        };

        match self.backend.store_timeline(batch).await {
            Ok(()) => {
                tracing::debug!(
                    backend = self.backend.name(),
                    retained = retained.len(),
                    written = pending.len(),
                    pruned,
                    "Timeline flushed"
                );
            }
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    unsaved = pending.len(),
                    "Failed to persist timeline"
                );
                let mut inner = self.inner.lock().await;
                let newer = std::mem::replace(&mut inner.pending, pending);
                inner.pending.extend(newer);
            }
        }
    }

    /// Checks from the last `window_days` days, in stored order.
    pub async fn get_timeline(&self, window_days: i64) -> Vec<CheckRecord> {
        self.get_timeline_at(window_days, Utc::now()).await
    }

    /// [`get_timeline`](Self::get_timeline) against an explicit clock.
    pub async fn get_timeline_at(&self, window_days: i64, now: Timestamp) -> Vec<CheckRecord> {
        let cutoff = cutoff_iso(now, window_days);
        self.inner
            .lock()
            .await
            .records
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Number of records held in memory.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
