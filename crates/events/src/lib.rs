//! Monitor event bus and outbound notifications.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`MonitorEvent`]s from the monitor
//!   loop to the push channel and the notifier.
//! - [`delivery`]: external delivery channels (SMTP email).
//! - [`AvailabilityNotifier`]: emails subscribers when a station frees up.

pub mod bus;
pub mod delivery;
pub mod notifier;

pub use bus::{EventBus, MonitorEvent, StationChecked};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use notifier::AvailabilityNotifier;
