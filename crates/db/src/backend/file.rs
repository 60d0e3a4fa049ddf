//! JSON file persistence, used when no database is configured.
//!
//! Two documents are kept:
//!
//! - the timeline file, `{"checks": [CheckRecord, ...]}`, rewritten whole on
//!   every flush;
//! - the state file, `{"statuses": {id: StationState}, "history": [...]}`.
//!
//! Older deployments wrote the timeline as a bare array of transition
//! records. That shape is still accepted on load and replaced by the
//! canonical one on the next write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chargewatch_core::persistence::{
    PersistenceBackend, PersistenceError, RegistryBatch, RegistrySnapshot, TimelineBatch,
};
use chargewatch_core::station::{CheckRecord, StationState, StationStatus, TransitionEvent};
use serde::{Deserialize, Serialize};

pub struct FileBackend {
    timeline_path: PathBuf,
    state_path: PathBuf,
}

impl FileBackend {
    pub fn new(timeline_path: impl Into<PathBuf>, state_path: impl Into<PathBuf>) -> Self {
        Self {
            timeline_path: timeline_path.into(),
            state_path: state_path.into(),
        }
    }

    pub fn timeline_path(&self) -> &Path {
        &self.timeline_path
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }
}

// ---------------------------------------------------------------------------
// On-disk shapes
// ---------------------------------------------------------------------------

/// Either layout the timeline file may have.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimelineDocument {
    Checks {
        #[serde(default)]
        checks: Vec<StoredCheck>,
    },
    Legacy(Vec<StoredCheck>),
}

/// A check as found on disk. Legacy transition records carry
/// `new_status` instead of `status`; missing fields default to empty so a
/// damaged record is pruned rather than failing the whole load.
#[derive(Deserialize)]
struct StoredCheck {
    #[serde(default)]
    station_id: String,
    #[serde(default)]
    station_name: String,
    #[serde(alias = "new_status", default = "unknown_status")]
    status: StationStatus,
    #[serde(default)]
    timestamp: String,
}

fn unknown_status() -> StationStatus {
    StationStatus::Unknown
}

impl From<StoredCheck> for CheckRecord {
    fn from(stored: StoredCheck) -> Self {
        Self {
            station_id: stored.station_id,
            station_name: stored.station_name,
            status: stored.status,
            timestamp: stored.timestamp,
        }
    }
}

#[derive(Serialize)]
struct TimelineDocumentRef<'a> {
    checks: &'a [CheckRecord],
}

#[derive(Serialize, Deserialize, Default)]
struct StateDocument {
    #[serde(default)]
    statuses: HashMap<String, StationState>,
    #[serde(default)]
    history: Vec<TransitionEvent>,
}

#[derive(Serialize)]
struct StateDocumentRef<'a> {
    statuses: &'a HashMap<String, StationState>,
    history: &'a [TransitionEvent],
}

/// Decode a timeline file into canonical records.
fn decode_timeline(raw: &[u8]) -> Result<Vec<CheckRecord>, serde_json::Error> {
    let checks = match serde_json::from_slice::<TimelineDocument>(raw)? {
        TimelineDocument::Checks { checks } => checks,
        TimelineDocument::Legacy(events) => {
            tracing::info!(count = events.len(), "Migrating old-format timeline events");
            events
        }
    };
    Ok(checks.into_iter().map(CheckRecord::from).collect())
}

/// Read a file, treating "not found" as absent.
async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, std::io::Error> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace `path` in one step: write a sibling temp file, then rename it
/// over the target so readers see either the old or the new document.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

// ---------------------------------------------------------------------------
// PersistenceBackend
// ---------------------------------------------------------------------------

#[async_trait]
impl PersistenceBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load_registry(
        &self,
        history_limit: usize,
    ) -> Result<RegistrySnapshot, PersistenceError> {
        let Some(raw) = read_optional(&self.state_path).await? else {
            return Ok(RegistrySnapshot::default());
        };
        let doc: StateDocument = serde_json::from_slice(&raw)?;

        let mut history = doc.history;
        let excess = history.len().saturating_sub(history_limit);
        history.drain(..excess);

        Ok(RegistrySnapshot {
            states: doc.statuses,
            history,
        })
    }

    async fn store_registry(&self, batch: RegistryBatch<'_>) -> Result<(), PersistenceError> {
        let skip = batch.history.len().saturating_sub(batch.history_capacity);
        let doc = StateDocumentRef {
            statuses: batch.states,
            history: &batch.history[skip..],
        };
        let bytes = serde_json::to_vec(&doc)?;
        write_atomic(&self.state_path, &bytes).await?;
        Ok(())
    }

    /// Loads the whole document; pruning happens on the next flush.
    async fn load_timeline(&self, _cutoff: &str) -> Result<Vec<CheckRecord>, PersistenceError> {
        match read_optional(&self.timeline_path).await? {
            Some(raw) => Ok(decode_timeline(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn store_timeline(&self, batch: TimelineBatch<'_>) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(&TimelineDocumentRef {
            checks: batch.retained,
        })?;
        write_atomic(&self.timeline_path, &bytes).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, status: StationStatus, ts: &str) -> CheckRecord {
        CheckRecord {
            station_id: id.into(),
            station_name: id.to_uppercase(),
            status,
            timestamp: ts.into(),
        }
    }

    fn backend(dir: &tempfile::TempDir) -> FileBackend {
        FileBackend::new(dir.path().join("timeline.json"), dir.path().join("state.json"))
    }

    #[tokio::test]
    async fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);

        assert!(backend.load_timeline("").await.unwrap().is_empty());
        let snapshot = backend.load_registry(200).await.unwrap();
        assert!(snapshot.states.is_empty());
        assert!(snapshot.history.is_empty());
    }

    #[tokio::test]
    async fn timeline_written_as_checks_document() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let retained = vec![check("s1", StationStatus::InUse, "2025-01-01T00:00:00.000000Z")];

        backend
            .store_timeline(TimelineBatch {
                pending: &[],
                retained: &retained,
                cutoff: "",
            })
            .await
            .unwrap();

        let raw = std::fs::read_to_string(backend.timeline_path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["checks"][0]["status"], "in_use");
        assert_eq!(json["checks"][0]["station_id"], "s1");
        assert!(!dir.path().join("timeline.json.tmp").exists());
    }

    #[tokio::test]
    async fn store_overwrites_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let first = vec![check("s1", StationStatus::Available, "a"), check("s1", StationStatus::InUse, "b")];
        let second = vec![check("s1", StationStatus::InUse, "b")];

        for retained in [&first, &second] {
            backend
                .store_timeline(TimelineBatch {
                    pending: &[],
                    retained,
                    cutoff: "",
                })
                .await
                .unwrap();
        }

        assert_eq!(backend.load_timeline("").await.unwrap(), second);
    }

    #[tokio::test]
    async fn legacy_bare_array_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        std::fs::write(
            backend.timeline_path(),
            r#"[
                {"station_id": "s1", "station_name": "S1", "old_status": null,
                 "new_status": "available", "timestamp": "2025-01-01T10:00:00"},
                {"station_id": "s1", "station_name": "S1", "old_status": "available",
                 "new_status": "in_use", "timestamp": "2025-01-01T11:00:00"}
            ]"#,
        )
        .unwrap();

        let records = backend.load_timeline("").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, StationStatus::Available);
        assert_eq!(records[1].status, StationStatus::InUse);
        assert_eq!(records[1].timestamp, "2025-01-01T11:00:00");
    }

    #[tokio::test]
    async fn object_without_checks_key_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        std::fs::write(backend.timeline_path(), "{}").unwrap();

        assert!(backend.load_timeline("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_timeline_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        std::fs::write(backend.timeline_path(), "{not json").unwrap();

        assert!(matches!(
            backend.load_timeline("").await,
            Err(PersistenceError::Json(_))
        ));
    }

    #[tokio::test]
    async fn registry_round_trip_keeps_newest_history() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);

        let mut states = HashMap::new();
        states.insert(
            "s1".to_string(),
            StationState {
                status: StationStatus::InUse,
                last_check: "t3".into(),
                in_use_since: Some("t2".into()),
            },
        );
        let history: Vec<_> = ["t1", "t2", "t3"]
            .iter()
            .map(|ts| TransitionEvent {
                station_id: "s1".into(),
                station_name: "S1".into(),
                old_status: None,
                new_status: StationStatus::InUse,
                timestamp: ts.to_string(),
            })
            .collect();

        backend
            .store_registry(RegistryBatch {
                states: &states,
                new_transitions: &history[2..],
                history: &history,
                history_capacity: 2,
            })
            .await
            .unwrap();

        let snapshot = backend.load_registry(200).await.unwrap();
        assert_eq!(snapshot.states, states);
        let stamps: Vec<_> = snapshot.history.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["t2", "t3"]);

        let limited = backend.load_registry(1).await.unwrap();
        assert_eq!(limited.history.len(), 1);
        assert_eq!(limited.history[0].timestamp, "t3");
    }
}
