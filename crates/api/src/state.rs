use std::sync::Arc;

use chargewatch_core::persistence::PersistenceBackend;
use chargewatch_core::registry::StatusRegistry;
use chargewatch_core::timeline::TimelineStore;
use chargewatch_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Handlers only read from the registry and timeline; the monitor loop is
/// their sole writer.
#[derive(Clone)]
pub struct AppState {
    /// Current station states and transition history.
    pub registry: Arc<StatusRegistry>,
    /// Raw check records for the timeline view.
    pub timeline: Arc<TimelineStore>,
    /// Monitor events, forwarded to WebSocket clients.
    pub event_bus: Arc<EventBus>,
    /// The persistence backend chosen at startup (reported by `/health`).
    pub backend: Arc<dyn PersistenceBackend>,
    pub config: Arc<ServerConfig>,
}
