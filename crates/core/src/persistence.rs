//! The storage capability behind [`StatusRegistry`](crate::registry::StatusRegistry)
//! and [`TimelineStore`](crate::timeline::TimelineStore).
//!
//! Two implementations exist (PostgreSQL and local JSON files, both in
//! `chargewatch-db`). One is chosen at startup and injected as
//! `Arc<dyn PersistenceBackend>`; the stores never ask which one they hold.
//!
//! Each flush hands the backend both the *incremental* view (rows recorded
//! since the last successful flush) and the *retained* view (everything
//! currently held in memory). Append-only stores write the former, whole
//! document stores overwrite with the latter.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::station::{CheckRecord, StationState, TransitionEvent};

/// Failure reported by a backend. Callers log it and carry on.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

/// Registry contents restored at startup.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub states: HashMap<String, StationState>,
    /// Oldest first.
    pub history: Vec<TransitionEvent>,
}

/// Registry state handed to the backend once per cycle.
#[derive(Debug, Clone, Copy)]
pub struct RegistryBatch<'a> {
    /// Current state of every station seen so far.
    pub states: &'a HashMap<String, StationState>,
    /// Transitions recorded since the last successful flush, oldest first.
    pub new_transitions: &'a [TransitionEvent],
    /// The full in-memory transition log, oldest first.
    pub history: &'a [TransitionEvent],
    /// Number of transitions the backend should keep.
    pub history_capacity: usize,
}

/// Timeline state handed to the backend once per cycle.
#[derive(Debug, Clone, Copy)]
pub struct TimelineBatch<'a> {
    /// Checks recorded since the last successful flush.
    pub pending: &'a [CheckRecord],
    /// Every check inside the retention window, oldest first.
    pub retained: &'a [CheckRecord],
    /// Records with a timestamp below this are expired.
    pub cutoff: &'a str,
}

#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Short label for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Whether the backend can currently be reached.
    async fn is_healthy(&self) -> bool {
        true
    }

    /// Load station states and at most `history_limit` newest transitions.
    async fn load_registry(&self, history_limit: usize)
        -> Result<RegistrySnapshot, PersistenceError>;

    async fn store_registry(&self, batch: RegistryBatch<'_>) -> Result<(), PersistenceError>;

    /// Load stored checks. Backends that can filter cheaply only return
    /// records at or after `cutoff`.
    async fn load_timeline(&self, cutoff: &str) -> Result<Vec<CheckRecord>, PersistenceError>;

    async fn store_timeline(&self, batch: TimelineBatch<'_>) -> Result<(), PersistenceError>;
}
