//! Query functions for the monitor tables, one zero-sized repo per table.

mod station_state_repo;
mod status_history_repo;
mod timeline_check_repo;

pub use station_state_repo::StationStateRepo;
pub use status_history_repo::StatusHistoryRepo;
pub use timeline_check_repo::TimelineCheckRepo;
