//! The checking capability consumed by [`MonitorLoop`](crate::MonitorLoop).

use std::time::Duration;

use async_trait::async_trait;
use chargewatch_core::station::{StationConfig, StationStatus};

/// Why a check produced no status.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// The station could not be fetched. Only this station is affected.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The check did not finish in time.
    #[error("Check timed out after {0:?}")]
    Timeout(Duration),

    /// The checker itself is broken and must be reinitialized.
    #[error("Checker unusable: {0}")]
    Unusable(String),
}

impl CheckError {
    /// Whether the whole capability, not just one station, has failed.
    pub fn is_unusable(&self) -> bool {
        matches!(self, Self::Unusable(_))
    }
}

/// Turns a configured station into its current status.
///
/// The monitor loop owns the checker exclusively. It calls [`reinit`]
/// before the first cycle, after an [`Unusable`](CheckError::Unusable)
/// fault and on scheduled maintenance, and [`dispose`] when it stops.
///
/// [`reinit`]: StationChecker::reinit
/// [`dispose`]: StationChecker::dispose
#[async_trait]
pub trait StationChecker: Send + Sync {
    async fn check(&self, station: &StationConfig) -> Result<StationStatus, CheckError>;

    /// Tear down any held resources and build fresh ones.
    async fn reinit(&mut self) -> Result<(), CheckError>;

    /// Release held resources. Later checks fail as unusable until the
    /// next [`reinit`](StationChecker::reinit).
    async fn dispose(&mut self);
}
