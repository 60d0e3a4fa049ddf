use axum::extract::{Query, State};
use axum::Json;
use chargewatch_core::station::CheckRecord;
use chargewatch_core::timeline::RETENTION_DAYS;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TimelineParams {
    #[validate(range(min = 1, max = 365))]
    pub days: Option<i64>,
}

/// GET /api/timeline?days=N
///
/// Check records from the last `days` days (default 3). Records past the
/// retention window are gone regardless of `days`.
pub async fn get_timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> AppResult<Json<DataResponse<Vec<CheckRecord>>>> {
    params.validate()?;
    let days = params.days.unwrap_or(RETENTION_DAYS);

    Ok(Json(DataResponse {
        data: state.timeline.get_timeline(days).await,
    }))
}
