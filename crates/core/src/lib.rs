//! Chargewatch domain core.
//!
//! Station types, the [`StatusRegistry`](registry::StatusRegistry) that
//! tracks current state and transition history, the
//! [`TimelineStore`](timeline::TimelineStore) that retains raw checks for
//! a sliding window, and the [`PersistenceBackend`](persistence::PersistenceBackend)
//! capability both of them persist through.

pub mod error;
pub mod persistence;
pub mod registry;
pub mod station;
pub mod timeline;
pub mod types;
