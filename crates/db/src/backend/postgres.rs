//! PostgreSQL-backed persistence.
//!
//! Holds a single lazily-connected pool. The schema is created on the first
//! operation that reaches the server and retried on later operations if
//! that fails. Any connection or query failure is returned as a
//! [`PersistenceError`]; the stores log it and keep serving from memory.

use std::fmt::Display;

use async_trait::async_trait;
use chargewatch_core::persistence::{
    PersistenceBackend, PersistenceError, RegistryBatch, RegistrySnapshot, TimelineBatch,
};
use chargewatch_core::station::{CheckRecord, TransitionEvent};
use tokio::sync::OnceCell;

use crate::repositories::{StationStateRepo, StatusHistoryRepo, TimelineCheckRepo};
use crate::DbPool;

pub struct PgBackend {
    pool: DbPool,
    schema: OnceCell<()>,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Validate `database_url` and build a backend that connects on demand.
    pub fn connect_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        crate::create_lazy_pool(database_url).map(Self::new)
    }

    /// The pool, once the schema is known to exist.
    async fn ready(&self) -> Result<&DbPool, PersistenceError> {
        self.schema
            .get_or_try_init(|| async {
                crate::run_migrations(&self.pool).await.map_err(db_err)?;
                tracing::info!("Database tables initialized");
                Ok::<(), PersistenceError>(())
            })
            .await?;
        Ok(&self.pool)
    }
}

fn db_err(e: impl Display) -> PersistenceError {
    PersistenceError::Database(e.to_string())
}

#[async_trait]
impl PersistenceBackend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn is_healthy(&self) -> bool {
        crate::health_check(&self.pool).await.is_ok()
    }

    async fn load_registry(
        &self,
        history_limit: usize,
    ) -> Result<RegistrySnapshot, PersistenceError> {
        let pool = self.ready().await?;

        let states = StationStateRepo::list(pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|row| row.into_state())
            .collect();

        let history = StatusHistoryRepo::list_recent(pool, history_limit)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(TransitionEvent::from)
            .collect();

        Ok(RegistrySnapshot { states, history })
    }

    /// Upsert every state and append the new transitions in one
    /// transaction, then trim the log. A failed trim is only logged since
    /// the rows it would remove are already superseded.
    async fn store_registry(&self, batch: RegistryBatch<'_>) -> Result<(), PersistenceError> {
        let pool = self.ready().await?;

        let mut tx = pool.begin().await.map_err(db_err)?;
        for (station_id, state) in batch.states {
            StationStateRepo::upsert(&mut *tx, station_id, state)
                .await
                .map_err(db_err)?;
        }
        for event in batch.new_transitions {
            StatusHistoryRepo::insert(&mut *tx, event)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        if !batch.new_transitions.is_empty() {
            match StatusHistoryRepo::prune_to(pool, batch.history_capacity).await {
                Ok(deleted) if deleted > 0 => {
                    tracing::debug!(deleted, "Pruned status history");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to prune status history"),
            }
        }
        Ok(())
    }

    async fn load_timeline(&self, cutoff: &str) -> Result<Vec<CheckRecord>, PersistenceError> {
        let pool = self.ready().await?;
        let rows = TimelineCheckRepo::list_since(pool, cutoff)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(CheckRecord::from).collect())
    }

    /// Insert the pending checks atomically, then delete expired rows.
    async fn store_timeline(&self, batch: TimelineBatch<'_>) -> Result<(), PersistenceError> {
        let pool = self.ready().await?;

        if !batch.pending.is_empty() {
            let mut tx = pool.begin().await.map_err(db_err)?;
            TimelineCheckRepo::insert_batch(&mut *tx, batch.pending)
                .await
                .map_err(db_err)?;
            tx.commit().await.map_err(db_err)?;
        }

        match TimelineCheckRepo::delete_older_than(pool, batch.cutoff).await {
            Ok(deleted) if deleted > 0 => {
                tracing::debug!(deleted, "Pruned timeline checks");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to prune timeline checks"),
        }
        Ok(())
    }
}
