//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`MonitorEvent`]s. The
//! monitor loop is the only publisher; it publishes from a single task, so
//! every subscriber sees one station's events in the order they happened.

use chargewatch_core::station::{StationStatus, TransitionEvent};
use chargewatch_core::types::IsoTimestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// MonitorEvent
// ---------------------------------------------------------------------------

/// Payload of [`MonitorEvent::StationChecked`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationChecked {
    pub station_id: String,
    pub status: StationStatus,
    pub last_check: IsoTimestamp,
    pub in_use_since: Option<IsoTimestamp>,
}

/// Something the monitor loop observed.
///
/// Serialized as `{"event": "<name>", "data": {...}}`, which is also the
/// frame format of the WebSocket push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum MonitorEvent {
    /// A station's status differs from its previous check.
    #[serde(rename = "status_update")]
    StatusChanged(TransitionEvent),

    /// A station was checked. Published on every poll.
    #[serde(rename = "station_checked")]
    StationChecked(StationChecked),

    /// All stations of one cycle were processed.
    #[serde(rename = "cycle_complete")]
    CycleComplete { interval_seconds: u64 },
}

impl MonitorEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => "status_update",
            Self::StationChecked(_) => "station_checked",
            Self::CycleComplete { .. } => "cycle_complete",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use chargewatch_events::bus::{EventBus, MonitorEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(MonitorEvent::CycleComplete { interval_seconds: 40 });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: MonitorEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn transition() -> TransitionEvent {
        TransitionEvent {
            station_id: "s1".into(),
            station_name: "Station 1".into(),
            old_status: None,
            new_status: StationStatus::Available,
            timestamp: "2025-01-01T10:00:00.000000Z".into(),
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(MonitorEvent::StatusChanged(transition()));

        let received = rx.recv().await.expect("should receive the event");
        assert_matches!(received, MonitorEvent::StatusChanged(e) if e.station_id == "s1");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(MonitorEvent::CycleComplete {
            interval_seconds: 40,
        });

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(MonitorEvent::StationChecked(StationChecked {
            station_id: "s1".into(),
            status: StationStatus::Available,
            last_check: "t1".into(),
            in_use_since: None,
        }));
        bus.publish(MonitorEvent::StatusChanged(transition()));

        assert_eq!(rx.recv().await.unwrap().name(), "station_checked");
        assert_eq!(rx.recv().await.unwrap().name(), "status_update");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(MonitorEvent::CycleComplete {
            interval_seconds: 40,
        });
    }

    #[test]
    fn serializes_with_event_name_and_data() {
        let json = serde_json::to_value(MonitorEvent::StatusChanged(transition())).unwrap();
        assert_eq!(json["event"], "status_update");
        assert_eq!(json["data"]["station_id"], "s1");
        assert!(json["data"]["old_status"].is_null());
        assert_eq!(json["data"]["new_status"], "available");

        let json = serde_json::to_value(MonitorEvent::CycleComplete {
            interval_seconds: 40,
        })
        .unwrap();
        assert_eq!(json["event"], "cycle_complete");
        assert_eq!(json["data"]["interval_seconds"], 40);
    }
}
