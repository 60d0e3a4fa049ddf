//! Persistence backends for the station monitor.
//!
//! - [`PgBackend`] stores state, history and checks in PostgreSQL through
//!   the [`repositories`].
//! - [`FileBackend`] keeps the same data in two JSON documents.
//!
//! [`select_backend`] picks one from [`StorageConfig`] at startup.

pub mod backend;
pub mod models;
pub mod repositories;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub use backend::file::FileBackend;
pub use backend::postgres::PgBackend;
pub use backend::{select_backend, StorageConfig};

pub type DbPool = sqlx::PgPool;

/// How long an operation waits for a connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a pool that connects on first use and reconnects after failures.
///
/// Only the URL is validated here; an unreachable server surfaces as an
/// error on the first query instead of at startup.
pub fn create_lazy_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_lazy(database_url)
}

/// Run a trivial query to check that the database answers.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Create the monitor tables if they do not exist yet.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
