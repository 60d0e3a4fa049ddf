//! Row types for the monitor tables and their conversion to domain types.

use chargewatch_core::station::{CheckRecord, StationState, StationStatus, TransitionEvent};
use sqlx::FromRow;

/// A row from `scraper_state`.
#[derive(Debug, Clone, FromRow)]
pub struct StationStateRow {
    pub station_id: String,
    pub status: String,
    pub last_check: String,
    pub in_use_since: Option<String>,
}

impl StationStateRow {
    pub fn into_state(self) -> (String, StationState) {
        let state = StationState {
            status: parse_status(&self.status),
            last_check: self.last_check,
            in_use_since: self.in_use_since,
        };
        (self.station_id, state)
    }
}

/// A row from `status_history`.
#[derive(Debug, Clone, FromRow)]
pub struct TransitionRow {
    pub id: i64,
    pub station_id: String,
    pub station_name: String,
    pub old_status: Option<String>,
    pub new_status: String,
    pub timestamp: String,
}

impl From<TransitionRow> for TransitionEvent {
    fn from(row: TransitionRow) -> Self {
        Self {
            station_id: row.station_id,
            station_name: row.station_name,
            old_status: row.old_status.as_deref().map(parse_status),
            new_status: parse_status(&row.new_status),
            timestamp: row.timestamp,
        }
    }
}

/// A row from `timeline_checks`.
#[derive(Debug, Clone, FromRow)]
pub struct CheckRow {
    pub station_id: String,
    pub station_name: String,
    pub status: String,
    pub timestamp: String,
}

impl From<CheckRow> for CheckRecord {
    fn from(row: CheckRow) -> Self {
        Self {
            station_id: row.station_id,
            station_name: row.station_name,
            status: parse_status(&row.status),
            timestamp: row.timestamp,
        }
    }
}

/// Stored status text to [`StationStatus`]; unrecognised values read as `Unknown`.
fn parse_status(raw: &str) -> StationStatus {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(status = raw, "Unrecognised status in database, reading as unknown");
        StationStatus::Unknown
    })
}
