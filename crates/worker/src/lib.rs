//! Background station polling.
//!
//! - [`StationChecker`]: the capability that turns a station into a status.
//! - [`HttpChecker`]: the default checker, scraping the station page.
//! - [`MonitorLoop`]: the scheduler driving checks, state updates, timeline
//!   records and events.

pub mod checker;
pub mod http_checker;
pub mod monitor;

pub use checker::{CheckError, StationChecker};
pub use http_checker::HttpChecker;
pub use monitor::{CycleOutcome, MonitorLoop, MonitorSettings};
