//! Emails recipients when a station becomes available.
//!
//! [`AvailabilityNotifier`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and sends one email per transition into `available`. Delivery failures
//! are logged; the notifier never feeds back into the monitor.

use chargewatch_core::station::{StationStatus, TransitionEvent};
use tokio::sync::broadcast;

use crate::bus::MonitorEvent;
use crate::delivery::email::EmailDelivery;

pub struct AvailabilityNotifier {
    delivery: EmailDelivery,
}

impl AvailabilityNotifier {
    pub fn new(delivery: EmailDelivery) -> Self {
        Self { delivery }
    }

    /// Run the notification loop until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<MonitorEvent>) {
        tracing::info!(
            recipients = self.delivery.config().recipients.len(),
            "Availability notifier started"
        );
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some(transition) = availability_alert(&event) else {
                        continue;
                    };
                    if let Err(e) = self.delivery.send_availability(transition).await {
                        tracing::error!(
                            error = %e,
                            station_id = %transition.station_id,
                            "Failed to send availability email"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notifier lagged, some events were skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notifier shutting down");
                    break;
                }
            }
        }
    }
}

/// The transition worth an email, if `event` is one.
fn availability_alert(event: &MonitorEvent) -> Option<&TransitionEvent> {
    match event {
        MonitorEvent::StatusChanged(t) if t.new_status == StationStatus::Available => Some(t),
        _ => None,
    }
}
