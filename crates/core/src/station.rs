//! Station configuration, observed state, and the records derived from it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::IsoTimestamp;

// ---------------------------------------------------------------------------
// StationStatus
// ---------------------------------------------------------------------------

/// Classified availability of a station at one check.
///
/// `Unknown` means the checker ran but could not classify the page;
/// `Error` means the check itself failed. Both are kept distinct from a
/// station that was never checked (absent from the registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    Available,
    InUse,
    Error,
    #[serde(other)]
    Unknown,
}

impl StationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in_use",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "in_use" => Ok(Self::InUse),
            "error" => Ok(Self::Error),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::Validation(format!(
                "unrecognised station status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// StationConfig
// ---------------------------------------------------------------------------

/// A monitored station, loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct StationConfig {
    /// Stable unique identifier.
    #[validate(length(min = 1, max = 64))]
    pub id: String,

    /// Human readable name used in events and notifications.
    #[validate(length(min = 1))]
    pub name: String,

    /// Opaque handle handed to the checker (a page URL for the HTTP checker).
    #[serde(alias = "url")]
    #[validate(length(min = 1))]
    pub check_target: String,
}

/// Validate a station list at startup.
///
/// An empty list, a malformed entry, or a duplicated id is a fatal
/// misconfiguration.
pub fn validate_stations(stations: &[StationConfig]) -> Result<(), CoreError> {
    if stations.is_empty() {
        return Err(CoreError::Config("no stations configured".to_string()));
    }

    let mut seen = HashSet::new();
    for station in stations {
        station
            .validate()
            .map_err(|e| CoreError::Validation(format!("station '{}': {e}", station.id)))?;
        if !seen.insert(station.id.as_str()) {
            return Err(CoreError::Config(format!(
                "duplicate station id '{}'",
                station.id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// State and records
// ---------------------------------------------------------------------------

/// Latest observed state of one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationState {
    pub status: StationStatus,
    pub last_check: IsoTimestamp,
    /// Set at the transition into `in_use`; `None` for every other status.
    #[serde(default)]
    pub in_use_since: Option<IsoTimestamp>,
}

/// A change in a station's classified status between two checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub station_id: String,
    pub station_name: String,
    /// `None` for the first observation of a station.
    pub old_status: Option<StationStatus>,
    pub new_status: StationStatus,
    pub timestamp: IsoTimestamp,
}

/// One raw observation, kept whether or not it changed anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub station_id: String,
    pub station_name: String,
    pub status: StationStatus,
    pub timestamp: IsoTimestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
