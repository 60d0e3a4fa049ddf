//! Current station state and the bounded transition log.
//!
//! [`StatusRegistry`] is written only by the monitor loop and read by any
//! number of request handlers. Every [`update`](StatusRegistry::update)
//! runs under one write lock, so readers never observe a state whose
//! `in_use_since` disagrees with its `status`, or a transition without
//! its matching state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::persistence::{PersistenceBackend, RegistryBatch};
use crate::station::{StationState, StationStatus, TransitionEvent};

/// Maximum number of transitions retained (oldest evicted first).
pub const HISTORY_CAPACITY: usize = 200;

/// History length returned when a caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Result of recording one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// The state stored for the station after the update.
    pub state: StationState,
    /// Present when the status differs from the previous one.
    pub transition: Option<TransitionEvent>,
}

#[derive(Default)]
struct RegistryInner {
    states: HashMap<String, StationState>,
    history: VecDeque<TransitionEvent>,
    /// Transitions not yet handed to the backend.
    unsaved: Vec<TransitionEvent>,
}

pub struct StatusRegistry {
    backend: Arc<dyn PersistenceBackend>,
    inner: RwLock<RegistryInner>,
    flush_guard: Mutex<()>,
}

impl StatusRegistry {
    /// Create an empty registry.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            inner: RwLock::new(RegistryInner::default()),
            flush_guard: Mutex::new(()),
        }
    }

    /// Create a registry seeded with whatever the backend has stored.
    ///
    /// A backend failure is logged and yields an empty registry.
    pub async fn load(backend: Arc<dyn PersistenceBackend>) -> Self {
        let registry = Self::new(Arc::clone(&backend));

        match backend.load_registry(HISTORY_CAPACITY).await {
            Ok(snapshot) => {
                tracing::info!(
                    backend = backend.name(),
                    stations = snapshot.states.len(),
                    transitions = snapshot.history.len(),
                    "Restored station state"
                );
                let mut inner = registry.inner.write().await;
                inner.states = snapshot.states;
                inner.history = snapshot.history.into_iter().collect();
                trim_front(&mut inner.history, HISTORY_CAPACITY);
            }
            Err(e) => {
                tracing::error!(
                    backend = backend.name(),
                    error = %e,
                    "Failed to restore station state, starting empty"
                );
            }
        }

        registry
    }

    /// Record the outcome of one check.
    ///
    /// `in_use_since` is set to `timestamp` when the station moves into
    /// `in_use`, carried forward while it stays there and cleared as soon
    /// as it leaves. A transition is logged whenever the status differs
    /// from the stored one; the first observation of a station always
    /// counts as a transition from `None`.
    pub async fn update(
        &self,
        station_id: &str,
        station_name: &str,
        status: StationStatus,
        timestamp: &str,
    ) -> StatusUpdate {
        let mut inner = self.inner.write().await;

        let previous = inner.states.get(station_id);
        let old_status = previous.map(|s| s.status);

        let in_use_since = match (status, previous) {
            (StationStatus::InUse, Some(prev)) if prev.status == StationStatus::InUse => prev
                .in_use_since
                .clone()
                .or_else(|| Some(timestamp.to_string())),
            (StationStatus::InUse, _) => Some(timestamp.to_string()),
            _ => None,
        };

        let state = StationState {
            status,
            last_check: timestamp.to_string(),
            in_use_since,
        };
        inner.states.insert(station_id.to_string(), state.clone());

        let transition = (old_status != Some(status)).then(|| TransitionEvent {
            station_id: station_id.to_string(),
            station_name: station_name.to_string(),
            old_status,
            new_status: status,
            timestamp: timestamp.to_string(),
        });

        if let Some(event) = &transition {
            inner.history.push_back(event.clone());
            trim_front(&mut inner.history, HISTORY_CAPACITY);

            inner.unsaved.push(event.clone());
            let excess = inner.unsaved.len().saturating_sub(HISTORY_CAPACITY);
            inner.unsaved.drain(..excess);
        }

        StatusUpdate { state, transition }
    }

    /// Point-in-time copy of every station's state.
    pub async fn snapshot(&self) -> HashMap<String, StationState> {
        self.inner.read().await.states.clone()
    }

    /// State of a single station, `None` if it has never been checked.
    pub async fn get(&self, station_id: &str) -> Option<StationState> {
        self.inner.read().await.states.get(station_id).cloned()
    }

    /// The newest `limit` transitions, oldest first.
    pub async fn recent_history(&self, limit: usize) -> Vec<TransitionEvent> {
        let inner = self.inner.read().await;
        let skip = inner.history.len().saturating_sub(limit);
        inner.history.iter().skip(skip).cloned().collect()
    }

    /// Persist the current states and any unsaved transitions.
    ///
    /// Called once per cycle by the monitor loop. On failure the unsaved
    /// transitions are kept and offered again on the next call.
    pub async fn flush_cycle(&self) {
        let _guard = self.flush_guard.lock().await;

        let (states, history, unsaved) = {
            let mut inner = self.inner.write().await;
            (
                inner.states.clone(),
                inner.history.iter().cloned().collect::<Vec<_>>(),
                std::mem::take(&mut inner.unsaved),
            )
        };

        let batch = RegistryBatch {
            states: &states,
            new_transitions: &unsaved,
            history: &history,
            history_capacity: HISTORY_CAPACITY,
        };

        match self.backend.store_registry(batch).await {
            Ok(()) => {
                tracing::debug!(
                    backend = self.backend.name(),
                    stations = states.len(),
                    transitions = unsaved.len(),
                    "Station state persisted"
                );
            }
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    retained = unsaved.len(),
                    "Failed to persist station state"
                );
                let mut inner = self.inner.write().await;
                let newer = std::mem::replace(&mut inner.unsaved, unsaved);
                inner.unsaved.extend(newer);
                let excess = inner.unsaved.len().saturating_sub(HISTORY_CAPACITY);
                inner.unsaved.drain(..excess);
            }
        }
    }
}

fn trim_front<T>(log: &mut VecDeque<T>, capacity: usize) {
    while log.len() > capacity {
        log.pop_front();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::testing::RecordingBackend;
    use StationStatus::*;

    fn registry() -> (Arc<RecordingBackend>, StatusRegistry) {
        let backend = Arc::new(RecordingBackend::default());
        let registry = StatusRegistry::new(backend.clone());
        (backend, registry)
    }

    fn ts(n: u32) -> String {
        format!("2025-01-01T10:{n:02}:00.000000Z")
    }

    #[tokio::test]
    async fn first_observation_is_a_transition_from_none() {
        let (_, registry) = registry();
        let update = registry.update("s1", "S1", Unknown, &ts(1)).await;

        let event = update.transition.expect("first check must produce a transition");
        assert_eq!(event.old_status, None);
        assert_eq!(event.new_status, Unknown);
        assert_eq!(event.station_name, "S1");
    }

    #[tokio::test]
    async fn repeated_status_produces_no_transition() {
        let (_, registry) = registry();
        registry.update("s1", "S1", Available, &ts(1)).await;
        let update = registry.update("s1", "S1", Available, &ts(2)).await;

        assert!(update.transition.is_none());
        assert_eq!(update.state.last_check, ts(2));
        assert_eq!(registry.recent_history(10).await.len(), 1);
    }

    #[tokio::test]
    async fn five_cycle_scenario() {
        let (_, registry) = registry();
        let statuses = [Unknown, Unknown, InUse, InUse, Available];
        let mut since = Vec::new();

        for (i, status) in statuses.into_iter().enumerate() {
            let update = registry.update("s1", "S1", status, &ts(i as u32 + 1)).await;
            since.push(update.state.in_use_since);
        }

        assert_eq!(since, vec![None, None, Some(ts(3)), Some(ts(3)), None]);

        let history = registry.recent_history(50).await;
        let pairs: Vec<_> = history
            .iter()
            .map(|e| (e.old_status, e.new_status, e.timestamp.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (None, Unknown, ts(1)),
                (Some(Unknown), InUse, ts(3)),
                (Some(InUse), Available, ts(5)),
            ]
        );
    }

    #[tokio::test]
    async fn in_use_since_resets_after_leaving_in_use() {
        let (_, registry) = registry();
        registry.update("s1", "S1", InUse, &ts(1)).await;
        registry.update("s1", "S1", Error, &ts(2)).await;
        let update = registry.update("s1", "S1", InUse, &ts(3)).await;

        assert_eq!(update.state.in_use_since, Some(ts(3)));
    }

    #[tokio::test]
    async fn stations_are_tracked_independently() {
        let (_, registry) = registry();
        registry.update("s1", "S1", InUse, &ts(1)).await;
        registry.update("s2", "S2", Available, &ts(1)).await;
        registry.update("s2", "S2", Available, &ts(2)).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["s1"].in_use_since, Some(ts(1)));
        assert_eq!(snapshot["s2"].in_use_since, None);
        assert!(registry.get("s3").await.is_none());
    }

    #[tokio::test]
    async fn history_is_capped_fifo() {
        let (_, registry) = registry();
        for i in 0..(HISTORY_CAPACITY + 25) {
            let status = if i % 2 == 0 { Available } else { InUse };
            registry.update("s1", "S1", status, &format!("t{i:04}")).await;
        }

        let history = registry.recent_history(usize::MAX).await;
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].timestamp, "t0025");
        assert_eq!(history.last().unwrap().timestamp, "t0224");

        let limited = registry.recent_history(3).await;
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[2].timestamp, "t0224");
    }

    #[tokio::test]
    async fn flush_persists_states_and_new_transitions_once() {
        let (backend, registry) = registry();
        registry.update("s1", "S1", Available, &ts(1)).await;
        registry.flush_cycle().await;
        registry.flush_cycle().await;

        assert_eq!(backend.history.lock().unwrap().len(), 1);
        assert_eq!(backend.states.lock().unwrap()["s1"].status, Available);
    }

    #[tokio::test]
    async fn failed_flush_retries_transitions_later() {
        let (backend, registry) = registry();
        backend.set_failing(true);
        registry.update("s1", "S1", Available, &ts(1)).await;
        registry.flush_cycle().await;
        assert!(backend.history.lock().unwrap().is_empty());

        // Reads keep working while the backend is down.
        assert_eq!(registry.snapshot().await["s1"].status, Available);
        assert_eq!(registry.recent_history(50).await.len(), 1);

        registry.update("s1", "S1", InUse, &ts(2)).await;
        backend.set_failing(false);
        registry.flush_cycle().await;

        let stored: Vec<_> = backend
            .history
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.new_status)
            .collect();
        assert_eq!(stored, vec![Available, InUse]);
    }

    #[tokio::test]
    async fn load_restores_previous_state() {
        let backend = Arc::new(RecordingBackend::default());
        {
            let registry = StatusRegistry::new(backend.clone());
            registry.update("s1", "S1", InUse, &ts(1)).await;
            registry.flush_cycle().await;
        }

        let registry = StatusRegistry::load(backend).await;
        let update = registry.update("s1", "S1", InUse, &ts(2)).await;
        assert!(update.transition.is_none());
        assert_eq!(update.state.in_use_since, Some(ts(1)));
        assert_eq!(registry.recent_history(50).await.len(), 1);
    }

    #[tokio::test]
    async fn load_with_unreachable_backend_starts_empty() {
        let backend = Arc::new(RecordingBackend::default());
        backend.set_failing(true);
        let registry = StatusRegistry::load(backend).await;
        assert!(registry.snapshot().await.is_empty());
    }
}
