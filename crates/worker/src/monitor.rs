//! The station polling scheduler.
//!
//! [`MonitorLoop`] runs on one dedicated task. Each cycle it checks every
//! configured station in order and, per station:
//!
//! 1. runs the checker under a timeout (a fault becomes `error`),
//! 2. updates the [`StatusRegistry`],
//! 3. records the check in the [`TimelineStore`],
//! 4. publishes [`MonitorEvent::StationChecked`],
//! 5. publishes [`MonitorEvent::StatusChanged`] if the status changed.
//!
//! After the last station both stores are flushed and
//! [`MonitorEvent::CycleComplete`] is published. Every
//! [`MAINTENANCE_PERIOD`] cycles the checker is recycled.
//!
//! A panic inside a cycle is caught and logged, the checker is
//! reinitialized, and the loop carries on after the usual pause.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chargewatch_core::registry::StatusRegistry;
use chargewatch_core::station::{StationConfig, StationStatus};
use chargewatch_core::timeline::TimelineStore;
use chargewatch_core::types::now_iso;
use chargewatch_events::{EventBus, MonitorEvent, StationChecked};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::checker::{CheckError, StationChecker};

/// Cycles between scheduled checker recycles.
pub const MAINTENANCE_PERIOD: u64 = 100;

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 40;
const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;

/// Timing of the monitor loop.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Upper bound on a single station check.
    pub check_timeout: Duration,
}

impl MonitorSettings {
    /// Load settings from environment variables.
    ///
    /// | Variable             | Required | Default |
    /// |----------------------|----------|---------|
    /// | `CHECK_INTERVAL`     | no       | `40`    |
    /// | `CHECK_TIMEOUT_SECS` | no       | `30`    |
    pub fn from_env() -> Self {
        Self {
            interval: Duration::from_secs(secs_from_env(
                "CHECK_INTERVAL",
                DEFAULT_CHECK_INTERVAL_SECS,
            )),
            check_timeout: Duration::from_secs(secs_from_env(
                "CHECK_TIMEOUT_SECS",
                DEFAULT_CHECK_TIMEOUT_SECS,
            )),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            check_timeout: Duration::from_secs(DEFAULT_CHECK_TIMEOUT_SECS),
        }
    }
}

fn secs_from_env(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Err(_) => default,
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                tracing::warn!(variable = key, value = %raw, default, "Invalid value, using default");
                default
            }
        },
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every station was checked and the stores were flushed.
    Completed,
    /// The checker became unusable; it was reinitialized and the
    /// remaining stations were skipped.
    Abandoned,
    /// A stop was requested before all stations were checked.
    Stopped,
}

pub struct MonitorLoop {
    stations: Vec<StationConfig>,
    checker: Box<dyn StationChecker>,
    registry: Arc<StatusRegistry>,
    timeline: Arc<TimelineStore>,
    bus: Arc<EventBus>,
    settings: MonitorSettings,
    /// Cycle attempts so far, abandoned ones included.
    cycle_count: u64,
}

impl MonitorLoop {
    pub fn new(
        stations: Vec<StationConfig>,
        checker: Box<dyn StationChecker>,
        registry: Arc<StatusRegistry>,
        timeline: Arc<TimelineStore>,
        bus: Arc<EventBus>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            stations,
            checker,
            registry,
            timeline,
            bus,
            settings,
            cycle_count: 0,
        }
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Run until `cancel` is triggered, then dispose the checker.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            stations = self.stations.len(),
            interval_secs = self.settings.interval.as_secs(),
            "Monitor loop started"
        );

        if let Err(e) = self.checker.reinit().await {
            tracing::error!(error = %e, "Checker initialization failed, retrying next cycle");
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = AssertUnwindSafe(self.run_cycle(&cancel)).catch_unwind().await;
            match outcome {
                Ok(CycleOutcome::Stopped) => break,
                Ok(_) => {}
                Err(payload) => {
                    tracing::error!(
                        panic = %panic_message(&*payload),
                        "Monitor cycle panicked, resuming next cycle"
                    );
                    self.reinit_checker().await;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        self.checker.dispose().await;
        tracing::info!(cycles = self.cycle_count, "Monitor loop stopped");
    }

    /// Check every station once.
    ///
    /// `cancel` is observed before each station; a check already running
    /// is allowed to finish.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        for index in 0..self.stations.len() {
            if cancel.is_cancelled() {
                tracing::info!("Stop requested, ending cycle early");
                return CycleOutcome::Stopped;
            }

            let station = &self.stations[index];
            let result = self.check_station(station).await;
            let status = match result {
                Ok(status) => status,
                Err(e) if e.is_unusable() => {
                    tracing::error!(
                        station_id = %station.id,
                        error = %e,
                        "Checker unusable, reinitializing and abandoning cycle"
                    );
                    self.cycle_count += 1;
                    self.reinit_checker().await;
                    return CycleOutcome::Abandoned;
                }
                Err(e) => {
                    tracing::warn!(station_id = %station.id, error = %e, "Station check failed");
                    StationStatus::Error
                }
            };

            self.record(index, status).await;
        }

        self.cycle_count += 1;
        self.timeline.flush_cycle().await;
        self.registry.flush_cycle().await;

        self.bus.publish(MonitorEvent::CycleComplete {
            interval_seconds: self.settings.interval.as_secs(),
        });
        tracing::debug!(cycle = self.cycle_count, "Cycle complete");

        if self.cycle_count % MAINTENANCE_PERIOD == 0 {
            tracing::info!(cycle = self.cycle_count, "Scheduled checker recycle");
            self.reinit_checker().await;
        }

        CycleOutcome::Completed
    }

    async fn check_station(&self, station: &StationConfig) -> Result<StationStatus, CheckError> {
        let timeout = self.settings.check_timeout;
        match tokio::time::timeout(timeout, self.checker.check(station)).await {
            Ok(result) => result,
            Err(_) => Err(CheckError::Timeout(timeout)),
        }
    }

    /// Apply one check result to the stores and announce it.
    async fn record(&self, index: usize, status: StationStatus) {
        let station = &self.stations[index];
        let timestamp = now_iso();

        let update = self
            .registry
            .update(&station.id, &station.name, status, &timestamp)
            .await;
        self.timeline
            .record_check(&station.id, &station.name, status, &timestamp)
            .await;

        tracing::debug!(station_id = %station.id, status = %status, "Station checked");
        self.bus.publish(MonitorEvent::StationChecked(StationChecked {
            station_id: station.id.clone(),
            status,
            last_check: update.state.last_check,
            in_use_since: update.state.in_use_since,
        }));

        if let Some(transition) = update.transition {
            tracing::info!(
                station_id = %station.id,
                old_status = ?transition.old_status,
                new_status = %transition.new_status,
                "Station status changed"
            );
            self.bus.publish(MonitorEvent::StatusChanged(transition));
        }
    }

    async fn reinit_checker(&mut self) {
        if let Err(e) = self.checker.reinit().await {
            tracing::error!(error = %e, "Checker reinitialization failed, retrying next cycle");
        }
    }

    #[cfg(test)]
    fn set_cycle_count(&mut self, count: u64) {
        self.cycle_count = count;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
