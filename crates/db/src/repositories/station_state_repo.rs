//! Repository for the `scraper_state` table (one row per station).

use chargewatch_core::station::StationState;
use sqlx::{PgConnection, PgPool};

use crate::models::StationStateRow;

const COLUMNS: &str = "station_id, status, last_check, in_use_since";

/// Provides query operations for current station state.
pub struct StationStateRepo;

impl StationStateRepo {
    /// Insert or replace the state of one station.
    pub async fn upsert(
        conn: &mut PgConnection,
        station_id: &str,
        state: &StationState,
    ) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO scraper_state ({COLUMNS}) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (station_id) DO UPDATE \
             SET status = EXCLUDED.status, \
                 last_check = EXCLUDED.last_check, \
                 in_use_since = EXCLUDED.in_use_since"
        );
        sqlx::query(&query)
            .bind(station_id)
            .bind(state.status.as_str())
            .bind(&state.last_check)
            .bind(&state.in_use_since)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// List every stored station state.
    pub async fn list(pool: &PgPool) -> Result<Vec<StationStateRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scraper_state ORDER BY station_id");
        sqlx::query_as::<_, StationStateRow>(&query)
            .fetch_all(pool)
            .await
    }
}
