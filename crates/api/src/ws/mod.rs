//! WebSocket push channel.
//!
//! Every connection gets its own bus subscription, so there is no shared
//! connection registry: a client receives `initial_state` on connect and
//! then every [`MonitorEvent`](chargewatch_events::MonitorEvent) as it is
//! published.

pub mod handler;

pub use handler::ws_handler;
